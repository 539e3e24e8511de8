use async_trait::async_trait;
use tracing::instrument;

use super::{HandlerOutcome, JobHandler};
use crate::error::{DataTaskError, Result};
use crate::messaging::publisher::absolute_path_under;
use crate::models::{Dataset, FileFilter, Job, JobKind, QueueTag, UnitFile, UnitParams, WorkUnit};
use crate::orchestration::context::DispatchContext;

/// Video target tracking: one unit over every file of the current version
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingHandler;

/// `{root}{bucket}/{uri}`, plus `/versionFile/{version}` when the dataset is versioned
pub fn tracking_version_path(root: &str, bucket: &str, dataset: &Dataset) -> String {
    let base = absolute_path_under(
        root,
        &format!("{bucket}/{}", dataset.uri.trim_start_matches('/')),
    );
    match &dataset.current_version_name {
        Some(version) => format!("{base}/versionFile/{version}"),
        None => base,
    }
}

#[async_trait]
impl JobHandler for TrackingHandler {
    fn kind(&self) -> JobKind {
        JobKind::Tracking
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let dataset = ctx
            .metadata
            .dataset(job.dataset_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset", job.dataset_id))?;

        let files = match &dataset.current_version_name {
            Some(version) => {
                ctx.metadata
                    .list_version_files(dataset.id, version, 0, usize::MAX)
                    .await?
            }
            None => {
                ctx.metadata
                    .list_files(dataset.id, &FileFilter::All.annotation_statuses(), 0, usize::MAX)
                    .await?
            }
        };
        let label_ids = ctx
            .metadata
            .labels(dataset.id)
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();

        let mut units = Vec::new();
        if !files.is_empty() {
            let mut unit = WorkUnit::new(
                job.id,
                job.dataset_id,
                QueueTag::Track,
                files.iter().map(UnitFile::from).collect(),
                UnitParams::Tracking {
                    label_ids,
                    version_path: tracking_version_path(
                        &ctx.config.storage.file_store_root,
                        &ctx.config.storage.bucket_name,
                        &dataset,
                    ),
                },
            );
            unit.version_name = dataset.current_version_name.clone();
            units.push(unit);
        }

        let route = ctx.router.route(QueueTag::Track, job);
        Ok(ctx.publisher.publish(&route, units).await?.into())
    }
}
