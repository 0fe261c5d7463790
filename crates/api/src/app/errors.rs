use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use trackforge_jobs::JobStoreError;
use trackforge_payment::{PaymentRequirement, X402_VERSION};

pub fn json_error(
    status: StatusCode,
    error: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        Json(json!({
            "success": false,
            "error": error,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// 402 with fresh payment instructions in `accepts`.
///
/// Every payment-path failure (missing/undecodable credential, verification
/// failure, unreachable facilitator, settlement failure) lands here so the
/// client always learns exactly what to pay.
pub fn payment_required(
    requirement: &PaymentRequirement,
    error: impl Into<String>,
) -> axum::response::Response {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(json!({
            "x402Version": X402_VERSION,
            "error": error.into(),
            "accepts": [requirement],
        })),
    )
        .into_response()
}

pub fn store_error_to_response(err: JobStoreError) -> axum::response::Response {
    match &err {
        JobStoreError::NotFound(_) => json_error(
            StatusCode::NOT_FOUND,
            "Job not found",
            "Invalid job ID or job has expired",
        ),
        JobStoreError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "Invalid transition", err.to_string())
        }
        JobStoreError::AlreadyExists(_) => {
            json_error(StatusCode::CONFLICT, "Conflict", err.to_string())
        }
        JobStoreError::Storage(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Storage error",
            err.to_string(),
        ),
    }
}
