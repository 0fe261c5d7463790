//! Job storage: keyed records, the pending queue, and bounded history.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use trackforge_core::JobId;

use super::types::{Job, JobStatus};

/// Maximum number of terminal job ids retained for observability.
pub const HISTORY_CAPACITY: usize = 100;

/// Number of most-recent history entries the stats counters cover.
pub const STATS_WINDOW: usize = 20;

/// Job store abstraction.
///
/// The only shared mutable resource in the system; all job-state mutation
/// goes through this narrow operation set. `claim_next` is the
/// concurrency-critical primitive: implementations must pop-and-mark in a
/// single atomic step so two concurrent callers can never claim the same job.
pub trait JobStore: Send + Sync {
    /// Insert a new queued job at the tail of the pending queue.
    fn create(&self, job: Job) -> Result<Job, JobStoreError>;

    /// Get a job by ID.
    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError>;

    /// List pending jobs, oldest-enqueued first.
    fn list_queued(&self) -> Result<Vec<Job>, JobStoreError>;

    /// Number of pending jobs.
    fn queue_length(&self) -> Result<usize, JobStoreError>;

    /// 1-based position of a job in the pending queue, if it is queued.
    fn queue_position(&self, job_id: JobId) -> Result<Option<usize>, JobStoreError>;

    /// Atomically remove the oldest queued job and transition it to
    /// processing. Returns `None` if the queue is empty.
    fn claim_next(&self) -> Result<Option<Job>, JobStoreError>;

    /// Terminate a job successfully, recording its output artifacts.
    ///
    /// Allowed from `Queued` (the job is removed from the pending queue in
    /// the same step) or `Processing`; terminal jobs are rejected.
    fn complete(&self, job_id: JobId, tracks: Vec<String>) -> Result<Job, JobStoreError>;

    /// Terminate a job unsuccessfully. Same transition rules as `complete`.
    fn fail(&self, job_id: JobId, reason: String) -> Result<Job, JobStoreError>;

    /// Most recent terminal jobs, newest first, at most `limit`.
    fn history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError>;

    /// Queue/history statistics.
    fn stats(&self) -> Result<JobStats, JobStoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: &'static str,
        to: &'static str,
    },
    #[error("storage error: {0}")]
    Storage(String),
}

/// Queue/history statistics.
///
/// `recent_completed`/`recent_failed` are computed over the most recent
/// [`STATS_WINDOW`] history entries, not the whole history.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct JobStats {
    pub queue_length: usize,
    pub history_length: usize,
    pub recent_completed: usize,
    pub recent_failed: usize,
}

#[derive(Debug, Default)]
struct StoreInner {
    jobs: HashMap<JobId, Job>,
    /// Pending job ids, oldest first. Membership agrees with `status == Queued`
    /// at every instant; both are mutated under the same write lock.
    queue: VecDeque<JobId>,
    /// Terminal job ids, oldest first, bounded by the history capacity.
    history: VecDeque<JobId>,
}

impl StoreInner {
    fn push_history(&mut self, job_id: JobId, capacity: usize) {
        if self.history.len() >= capacity {
            self.history.pop_front();
        }
        self.history.push_back(job_id);
    }
}

/// In-memory job store.
///
/// A single `RwLock` over the whole state makes every operation (in
/// particular the pop-and-mark step of `claim_next`) one atomic critical
/// section. A transactional external store can replace this behind the same
/// trait without changing callers.
#[derive(Debug)]
pub struct InMemoryJobStore {
    inner: RwLock<StoreInner>,
    history_capacity: usize,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::with_history_capacity(HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            history_capacity: capacity,
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobStore {
    fn terminate(
        &self,
        job_id: JobId,
        to: &'static str,
        apply: impl FnOnce(&mut Job),
    ) -> Result<Job, JobStoreError> {
        let mut inner = self.inner.write().unwrap();

        let (job, was_queued) = match inner.jobs.get_mut(&job_id) {
            None => return Err(JobStoreError::NotFound(job_id)),
            Some(job) => {
                if job.status.is_terminal() {
                    return Err(JobStoreError::InvalidTransition {
                        id: job_id,
                        from: job.status.name(),
                        to,
                    });
                }
                let was_queued = job.status.is_queued();
                apply(job);
                (job.clone(), was_queued)
            }
        };

        if was_queued {
            // Terminating an unclaimed job: drop it from the pending queue in
            // the same critical section so queue membership and status never
            // disagree.
            inner.queue.retain(|id| *id != job_id);
        }

        let capacity = self.history_capacity;
        inner.push_history(job_id, capacity);

        Ok(job)
    }
}

impl JobStore for InMemoryJobStore {
    fn create(&self, job: Job) -> Result<Job, JobStoreError> {
        let mut inner = self.inner.write().unwrap();
        if inner.jobs.contains_key(&job.id) {
            return Err(JobStoreError::AlreadyExists(job.id));
        }

        let job_id = job.id;
        inner.queue.push_back(job_id);
        inner.jobs.insert(job_id, job.clone());

        tracing::info!(%job_id, title = %job.title, "job created");
        Ok(job)
    }

    fn get(&self, job_id: JobId) -> Result<Option<Job>, JobStoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.jobs.get(&job_id).cloned())
    }

    fn list_queued(&self) -> Result<Vec<Job>, JobStoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .queue
            .iter()
            .filter_map(|id| inner.jobs.get(id))
            .cloned()
            .collect())
    }

    fn queue_length(&self) -> Result<usize, JobStoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.queue.len())
    }

    fn queue_position(&self, job_id: JobId) -> Result<Option<usize>, JobStoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .queue
            .iter()
            .position(|id| *id == job_id)
            .map(|idx| idx + 1))
    }

    fn claim_next(&self) -> Result<Option<Job>, JobStoreError> {
        let mut inner = self.inner.write().unwrap();

        let Some(job_id) = inner.queue.pop_front() else {
            return Ok(None);
        };

        let job = inner.jobs.get_mut(&job_id).ok_or_else(|| {
            JobStoreError::Storage(format!("queued id {job_id} has no job record"))
        })?;

        job.mark_processing();
        let job = job.clone();

        tracing::info!(%job_id, "job claimed");
        Ok(Some(job))
    }

    fn complete(&self, job_id: JobId, tracks: Vec<String>) -> Result<Job, JobStoreError> {
        let job = self.terminate(job_id, "completed", |job| job.mark_completed(tracks))?;
        tracing::info!(%job_id, "job completed");
        Ok(job)
    }

    fn fail(&self, job_id: JobId, reason: String) -> Result<Job, JobStoreError> {
        let job = self.terminate(job_id, "failed", |job| job.mark_failed(reason))?;
        tracing::warn!(%job_id, error = %job.error().unwrap_or_default(), "job failed");
        Ok(job)
    }

    fn history(&self, limit: usize) -> Result<Vec<Job>, JobStoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .history
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| inner.jobs.get(id))
            .cloned()
            .collect())
    }

    fn stats(&self) -> Result<JobStats, JobStoreError> {
        let inner = self.inner.read().unwrap();

        let mut stats = JobStats {
            queue_length: inner.queue.len(),
            history_length: inner.history.len(),
            ..JobStats::default()
        };

        for id in inner.history.iter().rev().take(STATS_WINDOW) {
            match inner.jobs.get(id).map(|j| &j.status) {
                Some(JobStatus::Completed { .. }) => stats.recent_completed += 1,
                Some(JobStatus::Failed { .. }) => stats.recent_failed += 1,
                _ => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};

    use super::*;
    use crate::types::PaymentProof;

    fn queued_job(title: &str) -> Job {
        Job::new(JobId::new(), title, "lo-fi", None)
    }

    fn paid_job(title: &str) -> Job {
        Job::new(
            JobId::new(),
            title,
            "lo-fi",
            Some(PaymentProof {
                transaction: "0xabc".to_string(),
                payer: "0xpayer".to_string(),
            }),
        )
    }

    /// `list_queued` contains exactly the jobs whose status is `Queued`.
    fn assert_queue_status_agreement(store: &InMemoryJobStore) {
        let inner = store.inner.read().unwrap();
        let queued_ids: Vec<JobId> = inner.queue.iter().copied().collect();
        for id in &queued_ids {
            assert!(inner.jobs.get(id).unwrap().status.is_queued());
        }
        for (id, job) in &inner.jobs {
            if job.status.is_queued() {
                assert!(queued_ids.contains(id));
            } else {
                assert!(!queued_ids.contains(id));
            }
        }
    }

    #[test]
    fn create_and_claim_fifo() {
        let store = InMemoryJobStore::new();

        let ids: Vec<JobId> = (0..3)
            .map(|i| store.create(queued_job(&format!("track {i}"))).unwrap().id)
            .collect();

        assert_eq!(store.queue_length().unwrap(), 3);

        for expected in &ids {
            let claimed = store.claim_next().unwrap().unwrap();
            assert_eq!(claimed.id, *expected);
            assert!(claimed.status.is_processing());
        }

        assert!(store.claim_next().unwrap().is_none());
        assert_eq!(store.queue_length().unwrap(), 0);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let store = InMemoryJobStore::new();
        let job = queued_job("one");
        let dup = job.clone();

        store.create(job).unwrap();
        assert!(matches!(
            store.create(dup),
            Err(JobStoreError::AlreadyExists(_))
        ));
        assert_eq!(store.queue_length().unwrap(), 1);
    }

    #[test]
    fn no_double_claim_under_concurrency() {
        let store = Arc::new(InMemoryJobStore::new());

        let job_count = 8;
        let worker_count = 16;
        for i in 0..job_count {
            store.create(queued_job(&format!("track {i}"))).unwrap();
        }

        let barrier = Arc::new(Barrier::new(worker_count));
        let handles: Vec<_> = (0..worker_count)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.claim_next().unwrap()
                })
            })
            .collect();

        let claimed: Vec<JobId> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|job| job.id)
            .collect();

        // Exactly job_count distinct jobs across all callers combined.
        assert_eq!(claimed.len(), job_count);
        let unique: std::collections::HashSet<JobId> = claimed.iter().copied().collect();
        assert_eq!(unique.len(), job_count);
    }

    #[test]
    fn two_workers_one_job_exactly_one_wins() {
        let store = Arc::new(InMemoryJobStore::new());
        store.create(queued_job("only")).unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    store.claim_next().unwrap()
                })
            })
            .collect();

        let results: Vec<Option<Job>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_some()).count();
        assert_eq!(winners, 1);
    }

    #[test]
    fn sunset_vibes_full_lifecycle() {
        let store = InMemoryJobStore::new();

        let job = store
            .create(Job::new(JobId::new(), "Sunset Vibes", "lo-fi", None))
            .unwrap();
        assert_eq!(store.queue_length().unwrap(), 1);

        let claimed = store.claim_next().unwrap().unwrap();
        assert_eq!(claimed.id, job.id);
        assert!(claimed.status.is_processing());
        assert_eq!(store.queue_length().unwrap(), 0);

        store
            .complete(job.id, vec!["url1".to_string()])
            .unwrap();

        let done = store.get(job.id).unwrap().unwrap();
        assert_eq!(done.status.name(), "completed");
        assert_eq!(done.tracks().unwrap(), ["url1".to_string()]);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn complete_unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        assert!(matches!(
            store.complete(JobId::new(), vec!["url".to_string()]),
            Err(JobStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.fail(JobId::new(), "reason".to_string()),
            Err(JobStoreError::NotFound(_))
        ));
    }

    #[test]
    fn complete_from_queued_removes_from_queue() {
        let store = InMemoryJobStore::new();

        let first = store.create(queued_job("first")).unwrap();
        let second = store.create(queued_job("second")).unwrap();

        // Terminate the queued job directly, without claiming.
        store.fail(first.id, "cancelled by operator".to_string()).unwrap();

        assert_queue_status_agreement(&store);
        assert_eq!(store.queue_length().unwrap(), 1);
        assert_eq!(store.queue_position(second.id).unwrap(), Some(1));

        // FIFO continues with the survivor.
        assert_eq!(store.claim_next().unwrap().unwrap().id, second.id);
    }

    #[test]
    fn terminal_jobs_reject_further_transitions() {
        let store = InMemoryJobStore::new();
        let job = store.create(paid_job("once")).unwrap();

        store.claim_next().unwrap().unwrap();
        store.complete(job.id, vec!["url".to_string()]).unwrap();

        assert!(matches!(
            store.complete(job.id, vec!["other".to_string()]),
            Err(JobStoreError::InvalidTransition { .. })
        ));
        assert!(matches!(
            store.fail(job.id, "too late".to_string()),
            Err(JobStoreError::InvalidTransition { .. })
        ));

        // The original result survives the rejected attempts.
        let job = store.get(job.id).unwrap().unwrap();
        assert_eq!(job.tracks().unwrap(), ["url".to_string()]);
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let store = InMemoryJobStore::with_history_capacity(3);

        let mut ids = Vec::new();
        for i in 0..5 {
            let job = store.create(queued_job(&format!("track {i}"))).unwrap();
            store.claim_next().unwrap().unwrap();
            store
                .complete(job.id, vec![format!("https://cdn.example/{i}.mp3")])
                .unwrap();
            ids.push(job.id);
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.history_length, 3);

        // The three most recent survive, newest first; the oldest two are gone.
        let history = store.history(10).unwrap();
        let got: Vec<JobId> = history.iter().map(|j| j.id).collect();
        assert_eq!(got, vec![ids[4], ids[3], ids[2]]);
    }

    #[test]
    fn history_limit_is_respected() {
        let store = InMemoryJobStore::new();
        for i in 0..6 {
            let job = store.create(queued_job(&format!("track {i}"))).unwrap();
            store.claim_next().unwrap().unwrap();
            store.fail(job.id, "boom".to_string()).unwrap();
        }
        assert_eq!(store.history(4).unwrap().len(), 4);
    }

    #[test]
    fn stats_cover_recent_window_only() {
        let store = InMemoryJobStore::new();

        // 5 completions followed by enough failures to push them out of the
        // stats window.
        for i in 0..5 {
            let job = store.create(queued_job(&format!("ok {i}"))).unwrap();
            store.claim_next().unwrap().unwrap();
            store.complete(job.id, vec!["url".to_string()]).unwrap();
        }
        for i in 0..STATS_WINDOW {
            let job = store.create(queued_job(&format!("bad {i}"))).unwrap();
            store.claim_next().unwrap().unwrap();
            store.fail(job.id, "boom".to_string()).unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.history_length, 5 + STATS_WINDOW);
        assert_eq!(stats.recent_completed, 0);
        assert_eq!(stats.recent_failed, STATS_WINDOW);
    }

    #[test]
    fn queue_position_is_one_based() {
        let store = InMemoryJobStore::new();
        let first = store.create(queued_job("first")).unwrap();
        let second = store.create(queued_job("second")).unwrap();

        assert_eq!(store.queue_position(first.id).unwrap(), Some(1));
        assert_eq!(store.queue_position(second.id).unwrap(), Some(2));

        store.claim_next().unwrap().unwrap();
        assert_eq!(store.queue_position(first.id).unwrap(), None);
        assert_eq!(store.queue_position(second.id).unwrap(), Some(1));
        assert_eq!(store.queue_position(JobId::new()).unwrap(), None);
    }

    #[test]
    fn payment_proof_survives_lifecycle() {
        let store = InMemoryJobStore::new();
        let job = store.create(paid_job("paid")).unwrap();

        store.claim_next().unwrap().unwrap();
        store.complete(job.id, vec!["url".to_string()]).unwrap();

        let done = store.get(job.id).unwrap().unwrap();
        let proof = done.payment.unwrap();
        assert_eq!(proof.transaction, "0xabc");
        assert_eq!(proof.payer, "0xpayer");
    }
}
