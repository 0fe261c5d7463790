//! `trackforge-jobs` — job records, the pending queue, and bounded history.
//!
//! The [`store::JobStore`] trait is the seam between request handlers and
//! storage; [`store::InMemoryJobStore`] is the default implementation.

pub mod store;
pub mod types;

pub use store::{InMemoryJobStore, JobStats, JobStore, JobStoreError, HISTORY_CAPACITY, STATS_WINDOW};
pub use types::{Job, JobStatus, PaymentProof};
