//! Paid job submission.
//!
//! Protocol ordering is the load-bearing contract here: verify the payment,
//! validate the business input, settle, then create the job. A payer is
//! never charged for a request that cannot produce a job, and a job is never
//! created without a recorded settlement.

use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use base64::Engine as _;
use base64::engine::general_purpose;
use serde_json::json;

use trackforge_core::{JobId, RequestId};
use trackforge_jobs::{Job, PaymentProof};

use crate::app::dto::GenerateRequest;
use crate::app::services::{AVERAGE_JOB_DURATION_SECS, AppServices};
use crate::app::errors;

/// Header carrying the base64-encoded payment credential.
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Header carrying the base64-encoded settlement receipt on success.
pub const X_PAYMENT_RESPONSE_HEADER: &str = "X-PAYMENT-RESPONSE";

pub async fn submit(
    Extension(services): Extension<Arc<AppServices>>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let request_id = RequestId::new();
    let resource = format!("{}/api/generate", services.public_base_url);
    let requirement = services.gate.requirement(&resource);

    let Some(raw_credential) = headers
        .get(X_PAYMENT_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return errors::payment_required(&requirement, "X-PAYMENT header is required");
    };

    let credential = match services.gate.decode(raw_credential) {
        Ok(credential) => credential,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "rejecting undecodable payment credential");
            return errors::payment_required(&requirement, e.to_string());
        }
    };
    tracing::debug!(%request_id, ?credential, "payment credential decoded");

    if let Err(e) = services.gate.verify(&credential, &requirement).await {
        tracing::warn!(%request_id, error = %e, "payment verification did not pass");
        return errors::payment_required(&requirement, e.to_string());
    }

    // Business validation sits between verify and settle: an invalid request
    // must not consume payment.
    let (title, style) = match parse_generate_request(&body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    let settled = match services.gate.settle(&credential, &requirement).await {
        Ok(settled) => settled,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "payment settlement did not pass");
            return errors::payment_required(&requirement, e.to_string());
        }
    };

    let job = Job::new(
        JobId::new(),
        title,
        style,
        Some(PaymentProof {
            transaction: settled.transaction.clone(),
            payer: settled.payer.clone(),
        }),
    );

    let job = match services.jobs.create(job) {
        Ok(job) => job,
        Err(e) => {
            tracing::error!(%request_id, error = %e, "job creation failed after settlement");
            return errors::store_error_to_response(e);
        }
    };

    let position = services
        .jobs
        .queue_position(job.id)
        .ok()
        .flatten()
        .unwrap_or(1);
    let estimated_wait = position as u64 * AVERAGE_JOB_DURATION_SECS;

    services.notifier.notify_new_job(&job);

    let receipt = general_purpose::STANDARD.encode(
        serde_json::to_vec(&json!({
            "success": true,
            "transaction": &settled.transaction,
            "network": &settled.network,
            "payer": &settled.payer,
        }))
        .unwrap_or_default(),
    );

    (
        StatusCode::ACCEPTED,
        [(X_PAYMENT_RESPONSE_HEADER, receipt)],
        Json(json!({
            "success": true,
            "jobId": job.id.to_string(),
            "status": "queued",
            "position": position,
            "estimatedWaitSeconds": estimated_wait,
            "message": format!(
                "Your track \"{}\" is queued. Poll /api/status/{} for updates.",
                job.title, job.id
            ),
            "statusUrl": format!("/api/status/{}", job.id),
            "createdAt": job.created_at,
            "payment": {
                "transaction": settled.transaction,
                "amount": services.gate.config().price_display(),
                "payer": settled.payer,
            },
        })),
    )
        .into_response()
}

fn parse_generate_request(body: &[u8]) -> Result<(String, String), axum::response::Response> {
    let request: GenerateRequest = serde_json::from_slice(body).map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "Invalid request body",
            "Body must be a JSON object with 'title' and 'style'",
        )
    })?;

    let title = request
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let style = request
        .style
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    match (title, style) {
        (Some(title), Some(style)) => Ok((title, style)),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "Missing required fields",
            "Both 'title' and 'style' are required",
        )),
    }
}
