//! The external payment facilitator boundary.
//!
//! The facilitator is an opaque network oracle: `verify` checks a credential
//! without moving funds, `settle` finalizes the transfer. Transport failures
//! are distinct from the facilitator judging the payment invalid.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::config::PaymentRequirement;
use crate::credential::PaymentCredential;

/// Protocol version sent on every facilitator request.
pub const X402_VERSION: u32 = 1;

/// Transport-level facilitator failure (network error, timeout).
#[derive(Debug, Error)]
pub enum FacilitatorError {
    #[error("facilitator unreachable: {0}")]
    Unreachable(String),
}

/// Outcome of a `verify` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationResult {
    pub is_valid: bool,
    pub payer: Option<String>,
    pub invalid_reason: Option<String>,
}

/// Outcome of a `settle` call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettlementResult {
    pub success: bool,
    pub transaction: Option<String>,
    pub payer: Option<String>,
    pub network: Option<String>,
    pub error_reason: Option<String>,
}

/// Facilitator abstraction; swapped for a counting double in tests.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<VerificationResult, FacilitatorError>;

    async fn settle(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<SettlementResult, FacilitatorError>;
}

/// HTTP facilitator client.
pub struct HttpFacilitator {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl HttpFacilitator {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }

    fn request_body(
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Value {
        json!({
            "x402Version": X402_VERSION,
            "paymentPayload": credential.as_value(),
            "paymentRequirements": requirement,
        })
    }

    /// POST a protocol request; the response body is parsed leniently since
    /// facilitator error payloads are not guaranteed to be JSON.
    async fn post(&self, path: &str, body: &Value) -> Result<(bool, Value), FacilitatorError> {
        let url = format!("{}/{}", self.base_url, path);

        let mut request = self.http_client.post(&url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FacilitatorError::Unreachable(e.to_string()))?;

        let ok = response.status().is_success();
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FacilitatorError::Unreachable(e.to_string()))?;

        let value =
            serde_json::from_str(&text).unwrap_or_else(|_| json!({ "raw": text }));

        tracing::debug!(%url, %status, "facilitator response");
        Ok((ok, value))
    }
}

fn stated_reason(value: &Value) -> Option<String> {
    for key in ["invalidReason", "errorReason", "error", "message"] {
        if let Some(reason) = value.get(key).and_then(Value::as_str) {
            return Some(reason.to_string());
        }
    }
    None
}

#[async_trait]
impl Facilitator for HttpFacilitator {
    async fn verify(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<VerificationResult, FacilitatorError> {
        let body = Self::request_body(credential, requirement);
        let (ok, value) = self.post("verify", &body).await?;

        let mut result: VerificationResult =
            serde_json::from_value(value.clone()).unwrap_or_default();
        if !ok {
            result.is_valid = false;
            if result.invalid_reason.is_none() {
                result.invalid_reason =
                    Some(stated_reason(&value).unwrap_or_else(|| "verification rejected".into()));
            }
        }
        Ok(result)
    }

    async fn settle(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<SettlementResult, FacilitatorError> {
        let body = Self::request_body(credential, requirement);
        let (ok, value) = self.post("settle", &body).await?;

        let mut result: SettlementResult =
            serde_json::from_value(value.clone()).unwrap_or_default();
        if !ok {
            result.success = false;
            if result.error_reason.is_none() {
                result.error_reason =
                    Some(stated_reason(&value).unwrap_or_else(|| "settlement rejected".into()));
            }
        }
        Ok(result)
    }
}
