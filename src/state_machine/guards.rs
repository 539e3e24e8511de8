use async_trait::async_trait;

use super::errors::{files_not_ready, GuardResult};
use crate::store::FileMetadataProvider;

/// Trait for implementing transition guards
#[async_trait]
pub trait StateGuard: Send + Sync {
    /// Check whether the transition may proceed for this dataset
    async fn check(&self, dataset_id: i64) -> GuardResult<()>;

    /// Get a description of this guard for logging
    fn description(&self) -> &'static str;
}

/// Publishing requires at least one file and every file manually marked
pub struct AllFilesMarkedGuard<P: ?Sized> {
    metadata: std::sync::Arc<P>,
}

impl<P: FileMetadataProvider + ?Sized> AllFilesMarkedGuard<P> {
    pub fn new(metadata: std::sync::Arc<P>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl<P: FileMetadataProvider + ?Sized> StateGuard for AllFilesMarkedGuard<P> {
    async fn check(&self, dataset_id: i64) -> GuardResult<()> {
        let summary = self.metadata.mark_summary(dataset_id).await?;

        if summary.total == 0 {
            return Err(files_not_ready(format!(
                "Dataset {dataset_id} has no files to publish"
            )));
        }
        if summary.unmarked > 0 {
            return Err(files_not_ready(format!(
                "Dataset {dataset_id} has {} of {} files not manually marked",
                summary.unmarked, summary.total
            )));
        }
        Ok(())
    }

    fn description(&self) -> &'static str {
        "All dataset files must be manually marked"
    }
}
