use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{HandlerOutcome, JobHandler};
use crate::error::Result;
use crate::models::{Job, JobKind, QueueTag};
use crate::orchestration::context::DispatchContext;

/// Lung segmentation over a medical dataset; `job.dataset_id` is the medicine id
#[derive(Debug, Clone, Copy, Default)]
pub struct MedicalAnnotationHandler;

#[async_trait]
impl JobHandler for MedicalAnnotationHandler {
    fn kind(&self) -> JobKind {
        JobKind::MedicalAnnotation
    }

    #[instrument(skip_all, fields(job_id = job.id, medicine_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let units = ctx.partitioner.partition_medical(job).await?;

        if job.file_filter.clears_existing_annotations() {
            let cleared = ctx.files.clear_medical_annotations(job.dataset_id).await?;
            debug!(medicine_id = job.dataset_id, cleared = cleared, "Cleared medical annotations");
        }

        let route = ctx.router.route(QueueTag::LungSegmentation, job);
        Ok(ctx.publisher.publish(&route, units).await?.into())
    }
}
