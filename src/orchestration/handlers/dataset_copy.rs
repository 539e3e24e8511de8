use async_trait::async_trait;
use tracing::{info, instrument};

use super::{HandlerOutcome, JobHandler};
use crate::error::{DataTaskError, Result};
use crate::logging::log_error;
use crate::models::{Job, JobKind};
use crate::orchestration::context::DispatchContext;
use crate::store::CopyRequest;

/// Copies one version of a dataset into another dataset.
///
/// The copy can run for a long time, so it is handed to the background
/// tracker and the job is finalised as soon as the request is submitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetCopyHandler;

#[async_trait]
impl JobHandler for DatasetCopyHandler {
    fn kind(&self) -> JobKind {
        JobKind::DatasetCopy
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let origin = ctx
            .metadata
            .dataset(job.dataset_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset", job.dataset_id))?;
        let target_id = job.target_dataset_id.ok_or_else(|| {
            DataTaskError::ValidationError(format!("dataset copy job {} has no target dataset", job.id))
        })?;
        let target = ctx
            .metadata
            .dataset(target_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset", target_id))?;
        let version_name = job
            .version_name
            .clone()
            .or_else(|| origin.current_version_name.clone())
            .ok_or_else(|| {
                DataTaskError::ValidationError(format!(
                    "dataset {} has no version to copy",
                    origin.id
                ))
            })?;
        let files = ctx.metadata.version_files(origin.id, &version_name).await?;

        info!(
            job_id = job.id,
            origin = origin.id,
            target = target.id,
            version = %version_name,
            files = files.len(),
            "Submitting dataset copy"
        );

        let request = CopyRequest {
            job_id: job.id,
            origin,
            target,
            version_name,
            files,
        };
        let copier = ctx.copier.clone();
        ctx.background.spawn(async move {
            let job_id = request.job_id;
            if let Err(error) = copier.copy_dataset(request).await {
                log_error(
                    "DatasetCopyHandler",
                    "copy_dataset",
                    &error.to_string(),
                    Some(&format!("job_id={job_id}")),
                );
            }
        });

        Ok(HandlerOutcome::CopySubmitted {
            target_dataset_id: target_id,
        })
    }
}
