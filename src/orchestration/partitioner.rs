//! # Task Partitioner
//!
//! Splits a claimed job's file set into work units.
//!
//! Files are read page by page (`partition.page_size`, large on purpose: it
//! bounds memory per page, not unit size) until a page comes back empty. Each
//! page is cut into units of `files_per_unit` files, and the dataset's current
//! version name and label type are attached to every unit of the page.
//!
//! Format-conversion jobs are split into numbered parts instead. Workers for
//! that format accept at most `format_conversion_parts` (256) shards, so parts
//! hold `total / 256` files until the last part, which takes everything left.
//! With `total <= 256` a single part holds every file.

use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::PartitionConfig;
use crate::error::{DataTaskError, Result};
use crate::messaging::publisher::absolute_path_under;
use crate::models::{
    DatasetVersion, FileRecord, Job, Label, QueueTag, UnitFile, UnitParams, WorkUnit,
};
use crate::store::FileMetadataProvider;

/// Size of format-conversion part `part_num`; `None` means unbounded
pub fn format_conversion_part_size(total: usize, part_num: usize, parts: usize) -> Option<usize> {
    if parts == 0 || total <= parts || part_num + 1 >= parts {
        None
    } else {
        Some(total / parts)
    }
}

/// Parent directory of `url` with its `origin` segment swapped for `annotation`
pub fn medical_annotation_path(url: &str) -> String {
    let parent = url.rsplit_once('/').map_or(url, |(parent, _)| parent);
    parent.replace("origin", "annotation")
}

#[derive(Clone)]
pub struct TaskPartitioner {
    metadata: Arc<dyn FileMetadataProvider>,
    config: PartitionConfig,
    file_store_root: String,
}

impl std::fmt::Debug for TaskPartitioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPartitioner")
            .field("config", &self.config)
            .field("file_store_root", &self.file_store_root)
            .finish()
    }
}

impl TaskPartitioner {
    pub fn new(
        metadata: Arc<dyn FileMetadataProvider>,
        config: PartitionConfig,
        file_store_root: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            config,
            file_store_root: file_store_root.into(),
        }
    }

    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Page through the files selected by the job's filter and cut them into
    /// annotation-style units tagged with `algorithm`
    #[instrument(skip(self, job), fields(job_id = job.id, dataset_id = job.dataset_id))]
    pub async fn partition_by_filter(&self, job: &Job, algorithm: QueueTag) -> Result<Vec<WorkUnit>> {
        let statuses = job.file_filter.annotation_statuses();
        let label_ids: Vec<i64> = self
            .metadata
            .labels(job.dataset_id)
            .await?
            .into_iter()
            .map(|label| label.id)
            .collect();

        let mut units = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .metadata
                .list_files(job.dataset_id, &statuses, offset, self.config.page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();

            let dataset = self
                .metadata
                .dataset(job.dataset_id)
                .await?
                .ok_or_else(|| DataTaskError::not_found("dataset", job.dataset_id))?;
            let label_type = self.metadata.label_type(job.dataset_id).await?;

            let page_units = self.split_page(&page, |files| {
                let mut unit = WorkUnit::new(
                    job.id,
                    job.dataset_id,
                    algorithm,
                    files,
                    UnitParams::Annotation {
                        label_ids: label_ids.clone(),
                    },
                );
                unit.version_name = dataset.current_version_name.clone();
                unit.label_type = label_type;
                unit
            });

            debug!(
                job_id = job.id,
                offset = offset,
                page_files = page.len(),
                page_units = page_units.len(),
                "Partitioned file page"
            );
            units.extend(page_units);
        }

        Ok(units)
    }

    /// Numbered parts over the files of `version`
    #[instrument(skip(self, job, version, labels), fields(job_id = job.id, version = %version.version_name))]
    pub async fn partition_format_conversion(
        &self,
        job: &Job,
        version: &DatasetVersion,
        dataset_path: &str,
        labels: &[Label],
    ) -> Result<Vec<WorkUnit>> {
        let total = usize::try_from(job.total).unwrap_or(0);
        let parts = self.config.format_conversion_parts;

        let mut units = Vec::new();
        let mut offset = 0;
        let mut part_num = 0;
        loop {
            let limit = format_conversion_part_size(total, part_num, parts).unwrap_or(usize::MAX);
            let files = self
                .metadata
                .list_version_files(job.dataset_id, &version.version_name, offset, limit)
                .await?;
            if files.is_empty() {
                break;
            }
            offset += files.len();

            let mut unit = WorkUnit::new(
                job.id,
                job.dataset_id,
                QueueTag::Ofrecord,
                files.iter().map(UnitFile::from).collect(),
                UnitParams::FormatConversion {
                    part_num,
                    dataset_path: dataset_path.to_string(),
                    labels: labels.to_vec(),
                    dataset_version_id: job.dataset_version_id,
                },
            );
            unit.version_name = Some(version.version_name.clone());
            units.push(unit);
            part_num += 1;
        }

        debug!(job_id = job.id, total = total, parts = units.len(), "Partitioned format conversion");
        Ok(units)
    }

    /// Medical-image units of `medical_batch_size` files
    #[instrument(skip(self, job), fields(job_id = job.id, medicine_id = job.dataset_id))]
    pub async fn partition_medical(&self, job: &Job) -> Result<Vec<WorkUnit>> {
        let statuses = job.file_filter.annotation_statuses();
        let mut files = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .metadata
                .list_medical_files(job.dataset_id, &statuses, offset, self.config.page_size)
                .await?;
            if page.is_empty() {
                break;
            }
            offset += page.len();
            files.extend(page);
        }

        let units = files
            .chunks(self.config.medical_batch_size)
            .map(|chunk| {
                let annotation_path = chunk
                    .first()
                    .map(|file| {
                        medical_annotation_path(&absolute_path_under(&self.file_store_root, &file.url))
                    })
                    .unwrap_or_default();
                WorkUnit::new(
                    job.id,
                    job.dataset_id,
                    QueueTag::LungSegmentation,
                    chunk
                        .iter()
                        .map(|file| UnitFile {
                            id: file.id,
                            url: file.url.clone(),
                        })
                        .collect(),
                    UnitParams::Medical {
                        medicine_id: job.dataset_id,
                        annotation_path,
                    },
                )
            })
            .collect();
        Ok(units)
    }

    fn split_page<F>(&self, page: &[FileRecord], mut build: F) -> Vec<WorkUnit>
    where
        F: FnMut(Vec<UnitFile>) -> WorkUnit,
    {
        page.chunks(self.config.files_per_unit)
            .map(|chunk| build(chunk.iter().map(UnitFile::from).collect()))
            .collect()
    }
}
