//! # System Constants
//!
//! Operational boundaries of the dispatcher. Most of these are defaults that
//! `DispatchConfig` can override; the shard count and status codes are fixed
//! because external workers and the job table depend on them.

/// Lifecycle event names published on the [`crate::events::EventPublisher`]
pub mod events {
    pub const JOB_CLAIMED: &str = "job.claimed";
    pub const JOB_FINALIZED: &str = "job.finalized";
    pub const DATASET_TRANSITIONED: &str = "dataset.transitioned";
}

/// Job status codes as stored by the job store
pub mod job_status {
    pub const PENDING: i16 = 0;
    pub const CLAIMED: i16 = 1;
    pub const DONE: i16 = 2;
    pub const FAILED: i16 = 3;
}

/// Score attached to every queue entry. All entries share it, so ordering
/// among them falls back to the queue store's tie-break rule.
pub const DEFAULT_PRIORITY_SCORE: f64 = 10.0;

/// Hard shard-count limit of the format-conversion workers.
pub const FORMAT_CONVERSION_PARTS: usize = 256;

/// Files fetched per listing page. Bounds memory per page, not unit size.
pub const DEFAULT_PAGE_SIZE: usize = 160_000;

/// Files carried by one annotation / text-classification work unit.
pub const DEFAULT_FILES_PER_UNIT: usize = 16;

/// Files carried by one medical-annotation work unit.
pub const MEDICAL_BATCH_SIZE: usize = 16;

/// Rows persisted per batch during table import.
pub const TABLE_IMPORT_CHUNK_SIZE: usize = 3_000;

/// Default poll gap of the claim loop in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

pub const DEFAULT_TASK_QUEUE_PREFIX: &str = "task_queue";
pub const DEFAULT_DETAIL_PREFIX: &str = "task_detail";
pub const DEFAULT_FILE_STORE_ROOT: &str = "/nfs/";
