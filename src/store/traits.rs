//! Adapter seams between the dispatch engine and its external collaborators.
//!
//! Every trait has an in-memory implementation in [`super::in_memory`] and a
//! Postgres implementation in [`crate::database`].

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    AnnotationStatus, Dataset, DatasetVersion, FileRecord, Job, JobStatus, Label, LabelType,
    MedicalFile, NewFileRecord, VersionFile,
};
use crate::state_machine::DatasetState;

/// Source of pending jobs and owner of the claim primitive
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Select one pending job candidate (oldest first). The claim itself is
    /// only won through [`JobStore::transition`].
    async fn claim_one_pending(&self) -> Result<Option<Job>>;

    /// Conditional status update; returns affected rows. `0` means another
    /// caller moved the job first, or `from → to` is not a forward move
    /// (see [`JobStatus::can_transition_to`]).
    async fn transition(&self, job_id: i64, from: JobStatus, to: JobStatus) -> Result<u64>;
}

/// Manual-mark counts used by the publish guard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkSummary {
    pub total: u64,
    pub unmarked: u64,
}

/// Read side of the dataset/file catalogue
#[async_trait]
pub trait FileMetadataProvider: Send + Sync {
    /// One page of the dataset's files whose annotation status is in `statuses`, ordered by id
    async fn list_files(
        &self,
        dataset_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>>;

    /// One page of the files registered in a dataset version, ordered by id
    async fn list_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<FileRecord>>;

    /// Original (non-derived) files of a version, the input of augmentation
    async fn list_files_for_enhancement(
        &self,
        dataset_id: i64,
        version_name: Option<&str>,
    ) -> Result<Vec<FileRecord>>;

    async fn list_files_by_ids(&self, file_ids: &[i64]) -> Result<Vec<FileRecord>>;

    async fn list_medical_files(
        &self,
        medicine_id: i64,
        statuses: &[AnnotationStatus],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<MedicalFile>>;

    async fn dataset(&self, dataset_id: i64) -> Result<Option<Dataset>>;

    async fn dataset_version(&self, version_id: i64) -> Result<Option<DatasetVersion>>;

    async fn labels(&self, dataset_id: i64) -> Result<Vec<Label>>;

    async fn label_type(&self, dataset_id: i64) -> Result<Option<LabelType>>;

    async fn version_files(&self, dataset_id: i64, version_name: &str) -> Result<Vec<VersionFile>>;

    async fn mark_summary(&self, dataset_id: i64) -> Result<MarkSummary>;
}

/// Write side used by handlers
#[async_trait]
pub trait FileWriter: Send + Sync {
    /// Reset in-progress annotations of a dataset; returns affected files
    async fn clear_annotations(&self, dataset_id: i64) -> Result<u64>;

    async fn clear_medical_annotations(&self, medicine_id: i64) -> Result<u64>;

    /// Insert new file records and return them with their ids
    async fn save_files(&self, dataset_id: i64, files: &[NewFileRecord]) -> Result<Vec<FileRecord>>;

    /// Register saved files in a dataset version
    async fn register_version_files(
        &self,
        dataset_id: i64,
        version_name: &str,
        files: &[FileRecord],
    ) -> Result<()>;
}

/// A document pushed to the text search index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    pub file_id: i64,
    pub dataset_id: i64,
    pub text: String,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn index(&self, documents: Vec<IndexDocument>) -> Result<()>;

    async fn clear_dataset(&self, dataset_id: i64) -> Result<()>;
}

/// Storage of the dataset lifecycle state; only the state machine uses it
#[async_trait]
pub trait DatasetStateStore: Send + Sync {
    async fn current_state(&self, dataset_id: i64) -> Result<Option<DatasetState>>;

    /// Move `expected → next` only if the stored state is still `expected`.
    /// Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        dataset_id: i64,
        expected: DatasetState,
        next: DatasetState,
    ) -> Result<bool>;
}

/// Everything needed to copy one dataset version into another dataset
#[derive(Debug, Clone, PartialEq)]
pub struct CopyRequest {
    pub job_id: i64,
    pub origin: Dataset,
    pub target: Dataset,
    pub version_name: String,
    pub files: Vec<VersionFile>,
}

/// Long-running copy executor; invoked off the claim loop
#[async_trait]
pub trait DatasetCopier: Send + Sync {
    async fn copy_dataset(&self, request: CopyRequest) -> Result<()>;
}
