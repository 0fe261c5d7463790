//! Privileged worker control surface.
//!
//! `status` and `history` are public; everything else requires the shared
//! worker secret, accepted through any one of three presentation forms so
//! different caller environments (CLI, cron, browser tooling) all work.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Query;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use trackforge_core::JobId;

use crate::app::dto::{self, WorkerCommand, WorkerQuery};
use crate::app::errors;
use crate::app::services::AppServices;

/// Dedicated secret header, for callers that cannot set `Authorization`.
pub const WORKER_SECRET_HEADER: &str = "X-Worker-Secret";

/// Default number of history entries returned.
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Ordered short-circuit check over the three secret presentation forms.
/// Any one match grants access.
fn authenticate(headers: &HeaderMap, query_secret: Option<&str>, secret: &str) -> bool {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(token) = value.strip_prefix("Bearer ") {
            if token.trim() == secret {
                return true;
            }
        }
    }

    if let Some(value) = headers
        .get(WORKER_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if value == secret {
            return true;
        }
    }

    query_secret.is_some_and(|s| s == secret)
}

fn unauthorized() -> axum::response::Response {
    errors::json_error(
        StatusCode::UNAUTHORIZED,
        "Unauthorized",
        "valid worker secret required",
    )
}

/// GET /api/worker
///
/// Status, history, claim, or queue inspection.
pub async fn control_get(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<WorkerQuery>,
    headers: HeaderMap,
) -> axum::response::Response {
    match query.action.as_deref() {
        // Public: queue/history statistics.
        Some("status") => match services.jobs.stats() {
            Ok(stats) => (
                StatusCode::OK,
                Json(json!({
                    "queueLength": stats.queue_length,
                    "historyLength": stats.history_length,
                    "recentCompleted": stats.recent_completed,
                    "recentFailed": stats.recent_failed,
                })),
            )
                .into_response(),
            Err(e) => errors::store_error_to_response(e),
        },

        // Public: recent terminal jobs.
        Some("history") => {
            let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
            match services.jobs.history(limit) {
                Ok(jobs) => {
                    let jobs: Vec<_> = jobs.iter().map(dto::job_detail).collect();
                    (StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response()
                }
                Err(e) => errors::store_error_to_response(e),
            }
        }

        action => {
            if !authenticate(&headers, query.secret.as_deref(), &services.worker_secret) {
                return unauthorized();
            }

            match action {
                // Atomic claim: removes the job from the queue.
                Some("claim") => match services.jobs.claim_next() {
                    Ok(Some(job)) => {
                        (StatusCode::OK, Json(json!({ "job": dto::job_detail(&job) })))
                            .into_response()
                    }
                    Ok(None) => (
                        StatusCode::OK,
                        Json(json!({ "job": null, "message": "No jobs in queue" })),
                    )
                        .into_response(),
                    Err(e) => errors::store_error_to_response(e),
                },

                // Inspection view of the queue, without claiming.
                _ => match services.jobs.list_queued() {
                    Ok(jobs) => {
                        let jobs: Vec<_> = jobs.iter().map(dto::queued_job_summary).collect();
                        (StatusCode::OK, Json(json!({ "jobs": jobs }))).into_response()
                    }
                    Err(e) => errors::store_error_to_response(e),
                },
            }
        }
    }
}

/// POST /api/worker
///
/// Complete or fail a job.
pub async fn control_post(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<WorkerQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    if !authenticate(&headers, query.secret.as_deref(), &services.worker_secret) {
        return unauthorized();
    }

    let command: WorkerCommand = match serde_json::from_slice(&body) {
        Ok(command) => command,
        Err(_) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                "Body must be a JSON object",
            );
        }
    };

    let Some(job_id) = command.job_id.as_deref() else {
        return errors::json_error(StatusCode::BAD_REQUEST, "Missing jobId", "'jobId' is required");
    };
    let Ok(job_id) = job_id.parse::<JobId>() else {
        return errors::json_error(
            StatusCode::NOT_FOUND,
            "Job not found",
            "Invalid job ID or job has expired",
        );
    };

    match command.action.as_deref() {
        Some("complete") => {
            let tracks = command.tracks.unwrap_or_default();
            if tracks.is_empty() {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "Missing tracks",
                    "'tracks' must contain at least one artifact URL",
                );
            }
            match services.jobs.complete(job_id, tracks) {
                Ok(job) => (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "jobId": job.id.to_string(),
                        "status": "completed",
                    })),
                )
                    .into_response(),
                Err(e) => errors::store_error_to_response(e),
            }
        }

        Some("fail") => {
            let reason = command
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| "Unknown error".to_string());
            match services.jobs.fail(job_id, reason) {
                Ok(job) => (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "jobId": job.id.to_string(),
                        "status": "failed",
                    })),
                )
                    .into_response(),
                Err(e) => errors::store_error_to_response(e),
            }
        }

        _ => errors::json_error(
            StatusCode::BAD_REQUEST,
            "Invalid action",
            "'action' must be 'complete' or 'fail'",
        ),
    }
}
