//! # Work Queue Publisher
//!
//! Turns a job's work units into queue entries. For every unit it assigns a
//! fresh sub-task id, rewrites file urls to absolute worker-visible paths and
//! serialises the payload; then all detail writes and queue adds of the job go
//! to the store in a single pipeline.
//!
//! Sub-task ids are UUID v7, so members with the shared priority score sort
//! in roughly creation order under the store's lexicographic tie-break.

use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::queue_keys::QueueRoute;
use super::queue_store::{QueueEntry, WorkQueueStore};
use crate::config::DispatchConfig;
use crate::error::{DataTaskError, Result};
use crate::logging::{log_dispatch_operation, log_error};
use crate::models::WorkUnit;

/// A unit after it has been handed to the queue store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedUnit {
    pub sub_task_id: String,
    pub detail_key: String,
    pub file_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub queue_key: String,
    pub units: Vec<PublishedUnit>,
}

impl PublishReport {
    pub fn total_files(&self) -> usize {
        self.units.iter().map(|unit| unit.file_count).sum()
    }
}

#[derive(Clone)]
pub struct WorkQueuePublisher {
    store: Arc<dyn WorkQueueStore>,
    file_store_root: String,
    priority_score: f64,
}

impl std::fmt::Debug for WorkQueuePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueuePublisher")
            .field("file_store_root", &self.file_store_root)
            .field("priority_score", &self.priority_score)
            .finish()
    }
}

impl WorkQueuePublisher {
    pub fn new(
        store: Arc<dyn WorkQueueStore>,
        file_store_root: impl Into<String>,
        priority_score: f64,
    ) -> Self {
        Self {
            store,
            file_store_root: file_store_root.into(),
            priority_score,
        }
    }

    pub fn from_config(store: Arc<dyn WorkQueueStore>, config: &DispatchConfig) -> Self {
        Self::new(
            store,
            config.storage.file_store_root.clone(),
            config.queue.priority_score,
        )
    }

    pub fn file_store_root(&self) -> &str {
        &self.file_store_root
    }

    /// Prefix a storage-relative path with the file store root
    pub fn absolute_path(&self, relative: &str) -> String {
        absolute_path_under(&self.file_store_root, relative)
    }

    /// Publish all units of one job in a single pipelined write.
    ///
    /// A store failure is reported as `PartialPublishFailure`: some of the
    /// writes may already be visible to workers and are not rolled back.
    #[instrument(skip_all, fields(job_id = route.job_id, queue_key = %route.queue_key(), units = units.len()))]
    pub async fn publish(&self, route: &QueueRoute, units: Vec<WorkUnit>) -> Result<PublishReport> {
        let queue_key = route.queue_key();
        if units.is_empty() {
            debug!(job_id = route.job_id, queue_key = %queue_key, "No work units to publish");
            return Ok(PublishReport {
                queue_key,
                units: Vec::new(),
            });
        }

        let mut details = Vec::with_capacity(units.len());
        let mut entries = Vec::with_capacity(units.len());
        let mut published = Vec::with_capacity(units.len());

        for mut unit in units {
            let sub_task_id = Uuid::now_v7().to_string();
            for file in &mut unit.files {
                file.url = self.absolute_path(&file.url);
            }
            unit.sub_task_id = Some(sub_task_id.clone());

            let detail_key = route.detail_key(&sub_task_id);
            details.push((detail_key.clone(), serde_json::to_string(&unit)?));
            entries.push(QueueEntry {
                queue_key: queue_key.clone(),
                member: sub_task_id.clone(),
                score: self.priority_score,
            });
            published.push(PublishedUnit {
                sub_task_id,
                detail_key,
                file_count: unit.files.len(),
            });
        }

        let report = PublishReport {
            queue_key,
            units: published,
        };

        if let Err(error) = self.store.pipeline_write(details, entries).await {
            log_error(
                "WorkQueuePublisher",
                "pipeline_write",
                &error.to_string(),
                Some(&format!(
                    "job_id={} queue_key={} units={}",
                    route.job_id,
                    report.queue_key,
                    report.units.len()
                )),
            );
            return Err(DataTaskError::PartialPublishFailure {
                job_id: route.job_id,
                units: report.units.len(),
                reason: error.to_string(),
            });
        }

        log_dispatch_operation(
            route.job_id,
            &report.queue_key,
            report.units.len(),
            report.total_files(),
            "published",
        );
        Ok(report)
    }
}

/// Join `root` and a storage-relative path with exactly one separator
pub fn absolute_path_under(root: &str, relative: &str) -> String {
    match (root.ends_with('/'), relative.starts_with('/')) {
        (true, true) => format!("{root}{}", &relative[1..]),
        (false, false) if !root.is_empty() => format!("{root}/{relative}"),
        _ => format!("{root}{relative}"),
    }
}
