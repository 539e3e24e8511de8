use async_trait::async_trait;
use tracing::instrument;

use super::{HandlerOutcome, JobHandler};
use crate::error::{DataTaskError, Result};
use crate::models::{Job, JobKind, QueueTag};
use crate::orchestration::context::DispatchContext;

/// Converts a dataset version into numbered shards for the ofrecord workers
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatConversionHandler;

#[async_trait]
impl JobHandler for FormatConversionHandler {
    fn kind(&self) -> JobKind {
        JobKind::FormatConversion
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let version_id = job.dataset_version_id.ok_or_else(|| {
            DataTaskError::ValidationError(format!(
                "format conversion job {} has no dataset version",
                job.id
            ))
        })?;
        let version = ctx
            .metadata
            .dataset_version(version_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset version", version_id))?;
        let labels = ctx.metadata.labels(job.dataset_id).await?;
        let dataset_path = format!(
            "{}/{}",
            ctx.config.storage.bucket_name,
            version.version_url.trim_start_matches('/')
        );

        let units = ctx
            .partitioner
            .partition_format_conversion(job, &version, &dataset_path, &labels)
            .await?;
        let route = ctx.router.route(QueueTag::Ofrecord, job);
        Ok(ctx.publisher.publish(&route, units).await?.into())
    }
}
