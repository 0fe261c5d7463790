//! The payment gate: structured error taxonomy over decode/verify/settle.
//!
//! The gate exposes the primitives; the request handler owns the ordering
//! (verify, then validate business input, then settle, then create the job)
//! so a payer is never charged for a request that cannot produce a job.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{PaymentConfig, PaymentRequirement};
use crate::credential::PaymentCredential;
use crate::facilitator::{Facilitator, FacilitatorError};

/// Payment failure, every variant surfaced to the caller as a retryable
/// payment-required response with fresh payment instructions.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("malformed payment credential: {0}")]
    MalformedCredential(String),
    #[error("payment verification failed: {0}")]
    VerificationFailed(String),
    #[error("payment facilitator unreachable: {0}")]
    FacilitatorUnreachable(String),
    #[error("payment settlement failed: {0}")]
    SettlementFailed(String),
}

/// A verified (but not yet settled) payment.
#[derive(Debug, Clone)]
pub struct VerifiedPayment {
    pub payer: Option<String>,
}

/// A settled payment; becomes the job's payment proof.
#[derive(Debug, Clone)]
pub struct SettledPayment {
    pub transaction: String,
    pub payer: String,
    pub network: Option<String>,
}

/// Payment gate over a facilitator.
#[derive(Clone)]
pub struct PaymentGate {
    config: PaymentConfig,
    facilitator: Arc<dyn Facilitator>,
}

impl PaymentGate {
    pub fn new(config: PaymentConfig, facilitator: Arc<dyn Facilitator>) -> Self {
        Self {
            config,
            facilitator,
        }
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Fresh payment requirement for a resource; echoed in every 402.
    pub fn requirement(&self, resource: &str) -> PaymentRequirement {
        self.config.requirement(resource)
    }

    pub fn decode(&self, raw: &str) -> Result<PaymentCredential, PaymentError> {
        PaymentCredential::decode(raw).map_err(|e| PaymentError::MalformedCredential(e.to_string()))
    }

    /// Check the credential with the facilitator without moving funds.
    pub async fn verify(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<VerifiedPayment, PaymentError> {
        let result = self
            .facilitator
            .verify(credential, requirement)
            .await
            .map_err(|e| match e {
                FacilitatorError::Unreachable(msg) => PaymentError::FacilitatorUnreachable(msg),
            })?;

        if !result.is_valid {
            return Err(PaymentError::VerificationFailed(
                result
                    .invalid_reason
                    .unwrap_or_else(|| "payment verification failed".to_string()),
            ));
        }

        tracing::info!(
            payer = result.payer.as_deref().unwrap_or("unknown"),
            "payment verified"
        );
        Ok(VerifiedPayment {
            payer: result.payer,
        })
    }

    /// Finalize the transfer. Only called after `verify` succeeded and the
    /// caller's business input validated.
    pub async fn settle(
        &self,
        credential: &PaymentCredential,
        requirement: &PaymentRequirement,
    ) -> Result<SettledPayment, PaymentError> {
        let result = self
            .facilitator
            .settle(credential, requirement)
            .await
            .map_err(|e| match e {
                FacilitatorError::Unreachable(msg) => PaymentError::FacilitatorUnreachable(msg),
            })?;

        if !result.success {
            return Err(PaymentError::SettlementFailed(
                result
                    .error_reason
                    .unwrap_or_else(|| "payment settlement failed".to_string()),
            ));
        }

        let Some(transaction) = result.transaction else {
            return Err(PaymentError::SettlementFailed(
                "facilitator omitted the transaction reference".to_string(),
            ));
        };

        let payer = result
            .payer
            .or_else(|| credential.payer_hint().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());

        tracing::info!(%transaction, %payer, "payment settled");
        Ok(SettledPayment {
            transaction,
            payer,
            network: result.network,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::Engine as _;
    use base64::engine::general_purpose;

    use super::*;
    use crate::facilitator::{SettlementResult, VerificationResult};

    /// Scriptable facilitator double with call counters.
    #[derive(Default)]
    struct MockFacilitator {
        verify_calls: AtomicUsize,
        settle_calls: AtomicUsize,
        verify_valid: bool,
        verify_unreachable: bool,
        settle_success: bool,
        settle_transaction: Option<String>,
    }

    #[async_trait]
    impl Facilitator for MockFacilitator {
        async fn verify(
            &self,
            _credential: &PaymentCredential,
            _requirement: &PaymentRequirement,
        ) -> Result<VerificationResult, FacilitatorError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            if self.verify_unreachable {
                return Err(FacilitatorError::Unreachable("connection refused".into()));
            }
            Ok(VerificationResult {
                is_valid: self.verify_valid,
                payer: self.verify_valid.then(|| "0xpayer".to_string()),
                invalid_reason: (!self.verify_valid).then(|| "bad signature".to_string()),
            })
        }

        async fn settle(
            &self,
            _credential: &PaymentCredential,
            _requirement: &PaymentRequirement,
        ) -> Result<SettlementResult, FacilitatorError> {
            self.settle_calls.fetch_add(1, Ordering::SeqCst);
            Ok(SettlementResult {
                success: self.settle_success,
                transaction: self.settle_transaction.clone(),
                payer: self.settle_success.then(|| "0xpayer".to_string()),
                network: Some("base".to_string()),
                error_reason: (!self.settle_success).then(|| "insufficient funds".to_string()),
            })
        }
    }

    fn credential() -> PaymentCredential {
        let raw = general_purpose::STANDARD.encode(
            serde_json::to_vec(&serde_json::json!({
                "scheme": "exact",
                "network": "base",
                "payload": { "authorization": { "from": "0xhint" } }
            }))
            .unwrap(),
        );
        PaymentCredential::decode(&raw).unwrap()
    }

    fn gate(facilitator: Arc<MockFacilitator>) -> PaymentGate {
        PaymentGate::new(PaymentConfig::default(), facilitator)
    }

    #[tokio::test]
    async fn invalid_verification_surfaces_reason_and_never_settles() {
        let facilitator = Arc::new(MockFacilitator {
            verify_valid: false,
            ..MockFacilitator::default()
        });
        let gate = gate(facilitator.clone());
        let requirement = gate.requirement("https://example.test/api/generate");

        let err = gate.verify(&credential(), &requirement).await.unwrap_err();
        assert!(matches!(err, PaymentError::VerificationFailed(reason) if reason == "bad signature"));
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_facilitator_is_distinct_from_invalid_payment() {
        let facilitator = Arc::new(MockFacilitator {
            verify_unreachable: true,
            ..MockFacilitator::default()
        });
        let gate = gate(facilitator);
        let requirement = gate.requirement("https://example.test/api/generate");

        let err = gate.verify(&credential(), &requirement).await.unwrap_err();
        assert!(matches!(err, PaymentError::FacilitatorUnreachable(_)));
    }

    #[tokio::test]
    async fn settlement_failure_carries_facilitator_reason() {
        let facilitator = Arc::new(MockFacilitator {
            verify_valid: true,
            settle_success: false,
            ..MockFacilitator::default()
        });
        let gate = gate(facilitator);
        let requirement = gate.requirement("https://example.test/api/generate");

        let err = gate.settle(&credential(), &requirement).await.unwrap_err();
        assert!(matches!(err, PaymentError::SettlementFailed(reason) if reason == "insufficient funds"));
    }

    #[tokio::test]
    async fn settlement_without_transaction_reference_is_a_failure() {
        let facilitator = Arc::new(MockFacilitator {
            verify_valid: true,
            settle_success: true,
            settle_transaction: None,
            ..MockFacilitator::default()
        });
        let gate = gate(facilitator);
        let requirement = gate.requirement("https://example.test/api/generate");

        let err = gate.settle(&credential(), &requirement).await.unwrap_err();
        assert!(matches!(err, PaymentError::SettlementFailed(_)));
    }

    #[tokio::test]
    async fn successful_settlement_yields_proof_fields() {
        let facilitator = Arc::new(MockFacilitator {
            verify_valid: true,
            settle_success: true,
            settle_transaction: Some("0xtx".to_string()),
            ..MockFacilitator::default()
        });
        let gate = gate(facilitator.clone());
        let requirement = gate.requirement("https://example.test/api/generate");

        let verified = gate.verify(&credential(), &requirement).await.unwrap();
        assert_eq!(verified.payer.as_deref(), Some("0xpayer"));

        let settled = gate.settle(&credential(), &requirement).await.unwrap();
        assert_eq!(settled.transaction, "0xtx");
        assert_eq!(settled.payer, "0xpayer");
        assert_eq!(facilitator.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(facilitator.settle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undecodable_credential_is_malformed() {
        let gate = gate(Arc::new(MockFacilitator::default()));
        let err = gate.decode("!!definitely not base64!!").unwrap_err();
        assert!(matches!(err, PaymentError::MalformedCredential(_)));
    }
}
