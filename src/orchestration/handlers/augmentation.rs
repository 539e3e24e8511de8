use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{HandlerOutcome, JobHandler};
use crate::error::{DataTaskError, Result};
use crate::models::{Job, JobKind, QueueTag, UnitFile, UnitParams, WorkUnit};
use crate::orchestration::context::DispatchContext;

/// Image enhancement over the original files of the current version
#[derive(Debug, Clone, Copy, Default)]
pub struct AugmentationHandler;

#[async_trait]
impl JobHandler for AugmentationHandler {
    fn kind(&self) -> JobKind {
        JobKind::Augmentation
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let dataset = ctx
            .metadata
            .dataset(job.dataset_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset", job.dataset_id))?;
        let files = ctx
            .metadata
            .list_files_for_enhancement(dataset.id, dataset.current_version_name.as_deref())
            .await?;
        debug!(job_id = job.id, files = files.len(), "Selected files for enhancement");

        let mut units = Vec::new();
        if !files.is_empty() {
            let mut unit = WorkUnit::new(
                job.id,
                job.dataset_id,
                QueueTag::Imgprocess,
                files.iter().map(UnitFile::from).collect(),
                UnitParams::Augmentation {
                    enhance_types: job.enhance_types.clone(),
                },
            );
            unit.version_name = dataset.current_version_name.clone();
            units.push(unit);
        }

        let route = ctx.router.route(QueueTag::Imgprocess, job);
        Ok(ctx.publisher.publish(&route, units).await?.into())
    }
}
