//! Read-only status projection for polling clients.

use std::sync::Arc;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::json;

use trackforge_core::JobId;
use trackforge_jobs::JobStatus;

use crate::app::errors;
use crate::app::services::{AVERAGE_JOB_DURATION_SECS, AppServices};

pub async fn job_status(
    Extension(services): Extension<Arc<AppServices>>,
    Path(job_id): Path<String>,
) -> axum::response::Response {
    let not_found = || {
        errors::json_error(
            StatusCode::NOT_FOUND,
            "Job not found",
            "Invalid job ID or job has expired",
        )
    };

    // Unparseable ids are indistinguishable from unknown ones to the caller.
    let Ok(job_id) = job_id.parse::<JobId>() else {
        return not_found();
    };

    let job = match services.jobs.get(job_id) {
        Ok(Some(job)) => job,
        Ok(None) => return not_found(),
        Err(e) => return errors::store_error_to_response(e),
    };

    let mut body = json!({
        "success": true,
        "jobId": job.id.to_string(),
        "status": job.status.name(),
        "title": job.title,
        "style": job.style,
        "createdAt": job.created_at,
    });

    match &job.status {
        JobStatus::Queued => {
            let position = services
                .jobs
                .queue_position(job_id)
                .ok()
                .flatten()
                .unwrap_or(1);
            body["position"] = json!(position);
            body["estimatedWaitSeconds"] = json!(position as u64 * AVERAGE_JOB_DURATION_SECS);
            body["message"] = json!(format!("Your track is #{position} in queue."));
        }
        JobStatus::Processing => {
            body["estimatedWaitSeconds"] = json!(AVERAGE_JOB_DURATION_SECS);
            body["message"] = json!("Your track is being generated now.");
        }
        JobStatus::Completed { tracks } => {
            body["tracks"] = json!(tracks);
            body["completedAt"] = json!(job.completed_at);
            body["deliveryDurationSeconds"] = json!(job.delivery_duration_secs());
            body["message"] =
                json!("Your tracks are ready! URLs are valid for streaming and download.");
        }
        JobStatus::Failed { error } => {
            body["error"] = json!(error);
            body["completedAt"] = json!(job.completed_at);
            body["message"] = json!("Generation failed. Contact support for assistance.");
        }
    }

    (StatusCode::OK, Json(body)).into_response()
}
