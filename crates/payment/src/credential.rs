//! Decoding of the caller-supplied payment credential.
//!
//! The credential arrives as a base64-encoded JSON object in the `X-PAYMENT`
//! header. It is held opaquely: the whole decoded object is forwarded
//! verbatim to the facilitator, and only structural hints (scheme, network,
//! payer address) are inspected locally.

use core::fmt;

use base64::Engine as _;
use base64::engine::general_purpose;
use serde_json::Value;
use thiserror::Error;

/// Credential decoding failure.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("credential must be a JSON object")]
    NotAnObject,
}

/// A decoded payment credential.
#[derive(Clone, PartialEq, Eq)]
pub struct PaymentCredential(Value);

impl PaymentCredential {
    /// Decode a raw `X-PAYMENT` header value.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let bytes = general_purpose::STANDARD.decode(raw.trim())?;
        let value: Value = serde_json::from_slice(&bytes)?;
        if !value.is_object() {
            return Err(DecodeError::NotAnObject);
        }
        Ok(Self(value))
    }

    pub fn scheme(&self) -> Option<&str> {
        self.0.get("scheme").and_then(Value::as_str)
    }

    pub fn network(&self) -> Option<&str> {
        self.0.get("network").and_then(Value::as_str)
    }

    /// Payer address claimed inside the credential's authorization, if any.
    /// Informational only; the facilitator's verdict is authoritative.
    pub fn payer_hint(&self) -> Option<&str> {
        self.0
            .pointer("/payload/authorization/from")
            .or_else(|| self.0.get("from"))
            .and_then(Value::as_str)
    }

    /// The full decoded object, forwarded to the facilitator.
    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

// Signature and authorization contents are secret material; logs only ever
// see the structural outline.
impl fmt::Debug for PaymentCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self
            .0
            .as_object()
            .map(|obj| obj.keys().map(String::as_str).collect())
            .unwrap_or_default();
        f.debug_struct("PaymentCredential")
            .field("scheme", &self.scheme())
            .field("network", &self.network())
            .field("keys", &keys)
            .finish()
    }
}
