//! `trackforge-payment` — the payment gate.
//!
//! Requirement construction, credential decoding, the facilitator boundary,
//! and the structured payment error taxonomy. The gate never creates jobs;
//! it only proves that a payment was verified and settled.

pub mod config;
pub mod credential;
pub mod facilitator;
pub mod gate;

pub use config::{PaymentConfig, PaymentRequirement, SCHEME_EXACT};
pub use credential::{DecodeError, PaymentCredential};
pub use facilitator::{
    Facilitator, FacilitatorError, HttpFacilitator, SettlementResult, VerificationResult,
    X402_VERSION,
};
pub use gate::{PaymentError, PaymentGate, SettledPayment, VerifiedPayment};
