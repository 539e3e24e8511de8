//! Table import: turns every row of a source table into a text file record.
//!
//! Each source file is processed independently. A failure on one file is
//! logged and the next file is still imported; the dataset receives a
//! `TableImportFinished` event after every successfully processed file.

use async_trait::async_trait;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use super::{HandlerOutcome, JobHandler};
use crate::error::{DataTaskError, Result};
use crate::logging::log_error;
use crate::messaging::publisher::absolute_path_under;
use crate::models::{Dataset, FileRecord, Job, JobKind, NewFileRecord};
use crate::orchestration::context::DispatchContext;
use crate::state_machine::DatasetEvent;
use crate::store::IndexDocument;

#[derive(Debug, Clone, Copy, Default)]
pub struct TableImportHandler;

/// Read a CSV file into one text line per row.
///
/// With `merge_columns` empty every column is kept; otherwise only the listed
/// zero-based columns, in the listed order. Missing columns are skipped.
/// Rows are joined with a single space.
pub fn read_table_rows(path: &Path, has_header: bool, merge_columns: &[usize]) -> Result<Vec<String>> {
    let file = File::open(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(has_header)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = if merge_columns.is_empty() {
            record.iter().collect::<Vec<_>>().join(" ")
        } else {
            merge_columns
                .iter()
                .filter_map(|&idx| record.get(idx))
                .collect::<Vec<_>>()
                .join(" ")
        };
        rows.push(text);
    }
    Ok(rows)
}

/// File name without its extension
fn file_stem(file: &FileRecord) -> &str {
    let name = if file.name.is_empty() {
        file.file_name()
    } else {
        file.name.as_str()
    };
    name.rsplit_once('.').map_or(name, |(stem, _)| stem)
}

impl TableImportHandler {
    /// Import one source file; returns the number of rows saved
    async fn import_file(
        &self,
        ctx: &DispatchContext,
        job: &Job,
        dataset: &Dataset,
        source: &FileRecord,
    ) -> Result<usize> {
        match source.extension().as_deref() {
            Some("csv") => {}
            other => {
                return Err(DataTaskError::TableImportError(format!(
                    "unsupported table format {:?} for file {}",
                    other.unwrap_or(""),
                    source.id
                )))
            }
        }

        let path = PathBuf::from(absolute_path_under(
            &ctx.config.storage.file_store_root,
            &source.url,
        ));
        let has_header = source.exclude_header;
        let merge_columns = job.merge_column_indices();
        let rows = tokio::task::spawn_blocking(move || read_table_rows(&path, has_header, &merge_columns))
            .await
            .map_err(|e| DataTaskError::TableImportError(format!("reader task failed: {e}")))??;
        info!(job_id = job.id, file_id = source.id, rows = rows.len(), "Read table rows");

        let stem = file_stem(source);
        let origin_dir = format!("{}/origin/", dataset.uri.trim_end_matches('/'));
        let records: Vec<NewFileRecord> = rows
            .into_iter()
            .enumerate()
            .map(|(idx, text)| {
                let name = format!("{stem}_{}.txt", idx + 1);
                NewFileRecord {
                    url: format!("{origin_dir}{name}"),
                    name,
                    text,
                }
            })
            .collect();

        let chunk_size = ctx.partitioner.config().table_import_chunk_size;
        for chunk in records.chunks(chunk_size) {
            let saved = ctx.files.save_files(dataset.id, chunk).await?;
            if let Some(version) = &dataset.current_version_name {
                ctx.files.register_version_files(dataset.id, version, &saved).await?;
            }
            let documents = saved
                .iter()
                .zip(chunk)
                .map(|(file, record)| IndexDocument {
                    file_id: file.id,
                    dataset_id: dataset.id,
                    text: record.text.clone(),
                })
                .collect();
            ctx.search_index.index(documents).await?;
            debug!(dataset_id = dataset.id, saved = saved.len(), "Saved table import chunk");
        }

        Ok(records.len())
    }
}

#[async_trait]
impl JobHandler for TableImportHandler {
    fn kind(&self) -> JobKind {
        JobKind::TableImport
    }

    #[instrument(skip_all, fields(job_id = job.id, dataset_id = job.dataset_id))]
    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        let dataset = ctx
            .metadata
            .dataset(job.dataset_id)
            .await?
            .ok_or_else(|| DataTaskError::not_found("dataset", job.dataset_id))?;
        let sources = ctx.metadata.list_files_by_ids(&job.file_ids).await?;
        if sources.len() < job.file_ids.len() {
            warn!(
                job_id = job.id,
                requested = job.file_ids.len(),
                found = sources.len(),
                "Some table source files were not found"
            );
        }

        let mut rows = 0;
        let mut failed_files = job.file_ids.len().saturating_sub(sources.len());
        for source in &sources {
            match self.import_file(ctx, job, &dataset, source).await {
                Ok(saved) => {
                    rows += saved;
                    if let Err(error) = ctx
                        .state_machine
                        .fire(dataset.id, DatasetEvent::TableImportFinished)
                        .await
                    {
                        log_error(
                            "TableImportHandler",
                            "fire_table_import_finished",
                            &error.to_string(),
                            Some(&format!("dataset_id={}", dataset.id)),
                        );
                    }
                }
                Err(error) => {
                    failed_files += 1;
                    log_error(
                        "TableImportHandler",
                        "import_file",
                        &error.to_string(),
                        Some(&format!("job_id={} file_id={}", job.id, source.id)),
                    );
                }
            }
        }

        Ok(HandlerOutcome::Imported {
            source_files: job.file_ids.len(),
            failed_files,
            rows,
        })
    }
}
