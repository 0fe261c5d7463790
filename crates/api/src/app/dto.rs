use serde::Deserialize;
use serde_json::{Value, json};

use trackforge_jobs::{Job, JobStatus};

// -------------------------
// Request DTOs
// -------------------------

/// Body of `POST /api/generate`. Fields are optional at the parse layer so
/// missing-field validation can produce the documented 400 shape instead of a
/// deserializer error.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub title: Option<String>,
    pub style: Option<String>,
}

/// Query string of `/api/worker`.
#[derive(Debug, Deserialize)]
pub struct WorkerQuery {
    pub action: Option<String>,
    pub limit: Option<usize>,
    pub secret: Option<String>,
}

/// Body of `POST /api/worker`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerCommand {
    pub action: Option<String>,
    pub job_id: Option<String>,
    pub tracks: Option<Vec<String>>,
    pub error: Option<String>,
}

// -------------------------
// Response mapping
// -------------------------

/// Queue inspection entry: enough for a worker to decide what to claim,
/// nothing more.
pub fn queued_job_summary(job: &Job) -> Value {
    json!({
        "jobId": job.id.to_string(),
        "title": job.title,
        "style": job.style,
        "createdAt": job.created_at,
        "payer": job.payment.as_ref().map(|p| p.payer.clone()),
    })
}

/// Full job record as exposed to the worker (claim/history views).
pub fn job_detail(job: &Job) -> Value {
    let mut value = json!({
        "jobId": job.id.to_string(),
        "title": job.title,
        "style": job.style,
        "status": job.status.name(),
        "createdAt": job.created_at,
        "completedAt": job.completed_at,
        "payer": job.payment.as_ref().map(|p| p.payer.clone()),
        "transaction": job.payment.as_ref().map(|p| p.transaction.clone()),
    });

    match &job.status {
        JobStatus::Completed { tracks } => {
            value["tracks"] = json!(tracks);
        }
        JobStatus::Failed { error } => {
            value["error"] = json!(error);
        }
        _ => {}
    }

    value
}
