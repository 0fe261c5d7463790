//! Core job types and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trackforge_core::JobId;

/// Proof that a payment was settled before the job was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Transaction reference returned by the facilitator on settlement.
    pub transaction: String,
    /// Address of the paying account.
    pub payer: String,
}

/// Job execution status.
///
/// Transitions are one-directional: `Queued → Processing → Completed | Failed`,
/// with a direct `Queued → Completed | Failed` shortcut for jobs terminated
/// without being claimed. Terminal states are never left.
///
/// The result payload lives on `Completed` and the reason on `Failed`, so a
/// completed job without tracks (or a failed one without a reason) cannot be
/// represented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the pending queue.
    Queued,
    /// Claimed by a worker, generation in progress.
    Processing,
    /// Finished successfully; `tracks` holds the output artifact URLs.
    Completed { tracks: Vec<String> },
    /// Finished unsuccessfully.
    Failed { error: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, JobStatus::Queued)
    }

    pub fn is_processing(&self) -> bool {
        matches!(self, JobStatus::Processing)
    }

    /// Wire/log name of the status.
    pub fn name(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Failed { .. } => "failed",
        }
    }
}

/// A unit of paid generation work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID, handed to the client as the tracking handle.
    pub id: JobId,
    /// Caller-supplied track title.
    pub title: String,
    /// Caller-supplied style descriptors.
    pub style: String,
    /// Current status.
    pub status: JobStatus,
    /// Settlement proof recorded at creation; absent only for jobs injected
    /// through test/admin paths.
    pub payment: Option<PaymentProof>,
    /// When the job was created. Immutable.
    pub created_at: DateTime<Utc>,
    /// When the job reached a terminal status; present iff terminal.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new queued job.
    pub fn new(
        id: JobId,
        title: impl Into<String>,
        style: impl Into<String>,
        payment: Option<PaymentProof>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            style: style.into(),
            status: JobStatus::Queued,
            payment,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Mark the job as claimed by a worker.
    pub fn mark_processing(&mut self) {
        self.status = JobStatus::Processing;
    }

    /// Mark the job as completed with its output artifacts.
    pub fn mark_completed(&mut self, tracks: Vec<String>) {
        self.status = JobStatus::Completed { tracks };
        self.completed_at = Some(Utc::now());
    }

    /// Mark the job as failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed {
            error: error.into(),
        };
        self.completed_at = Some(Utc::now());
    }

    /// Output artifact URLs, present iff completed.
    pub fn tracks(&self) -> Option<&[String]> {
        match &self.status {
            JobStatus::Completed { tracks } => Some(tracks),
            _ => None,
        }
    }

    /// Failure reason, present iff failed.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            JobStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Wall-clock duration from creation to terminal status, in seconds.
    pub fn delivery_duration_secs(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_seconds())
    }
}
