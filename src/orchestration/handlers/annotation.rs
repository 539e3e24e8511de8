use async_trait::async_trait;
use tracing::{debug, instrument};

use super::{HandlerOutcome, JobHandler};
use crate::error::Result;
use crate::models::{Job, JobKind, LabelType, QueueTag};
use crate::orchestration::context::DispatchContext;

/// Variants of the paged annotation pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationMode {
    Standard,
    /// Clears the dataset's annotations first, then runs as `Standard`
    ReAnnotation,
    /// Also clears the dataset's search-index text when annotations are cleared
    TextClassification,
}

/// Standard, re-annotation and text-classification jobs
#[derive(Debug, Clone, Copy)]
pub struct AnnotationHandler {
    mode: AnnotationMode,
}

impl AnnotationHandler {
    pub fn new(mode: AnnotationMode) -> Self {
        Self { mode }
    }

    fn queue_tag(&self, label_type: Option<LabelType>) -> QueueTag {
        match (self.mode, label_type) {
            (AnnotationMode::TextClassification, _) => QueueTag::TextClassification,
            (_, Some(LabelType::ImageNet)) => QueueTag::Imagenet,
            _ => QueueTag::Annotation,
        }
    }
}

#[async_trait]
impl JobHandler for AnnotationHandler {
    fn kind(&self) -> JobKind {
        match self.mode {
            AnnotationMode::Standard => JobKind::StandardAnnotation,
            AnnotationMode::ReAnnotation => JobKind::ReAnnotation,
            AnnotationMode::TextClassification => JobKind::TextClassification,
        }
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id, mode = ?self.mode))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        if self.mode == AnnotationMode::ReAnnotation {
            let cleared = ctx.files.clear_annotations(job.dataset_id).await?;
            debug!(dataset_id = job.dataset_id, cleared = cleared, "Cleared annotations for re-annotation");
        }

        let label_type = ctx.metadata.label_type(job.dataset_id).await?;
        let tag = self.queue_tag(label_type);
        let units = ctx.partitioner.partition_by_filter(job, tag).await?;

        // Units are built first so the clear only drops annotations that are about to be regenerated
        if job.file_filter.clears_existing_annotations() {
            ctx.files.clear_annotations(job.dataset_id).await?;
            if self.mode == AnnotationMode::TextClassification {
                ctx.search_index.clear_dataset(job.dataset_id).await?;
            }
        }

        let route = ctx.router.route(tag, job);
        let report = ctx.publisher.publish(&route, units).await?;
        Ok(report.into())
    }
}
