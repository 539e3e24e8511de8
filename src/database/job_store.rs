use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::error::{DataTaskError, Result};
use crate::models::{FileFilter, Job, JobStatus};
use crate::store::JobStore;

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    kind: i16,
    status: i16,
    dataset_id: i64,
    dataset_version_id: Option<i64>,
    target_dataset_id: Option<i64>,
    version_name: Option<String>,
    file_filter: i16,
    total: i64,
    merge_columns: Option<String>,
    enhance_types: Vec<i32>,
    file_ids: Vec<i64>,
    model_service_id: Option<i64>,
}

impl TryFrom<JobRow> for Job {
    type Error = DataTaskError;

    fn try_from(row: JobRow) -> Result<Self> {
        let status = JobStatus::from_code(row.status).ok_or_else(|| {
            DataTaskError::DatabaseError(format!("job {} has unknown status {}", row.id, row.status))
        })?;
        let file_filter = FileFilter::from_code(row.file_filter).unwrap_or_else(|| {
            warn!(job_id = row.id, file_filter = row.file_filter, "Unknown file filter, using all");
            FileFilter::All
        });
        Ok(Job {
            id: row.id,
            kind_code: row.kind,
            status,
            dataset_id: row.dataset_id,
            dataset_version_id: row.dataset_version_id,
            target_dataset_id: row.target_dataset_id,
            version_name: row.version_name,
            file_filter,
            total: row.total,
            merge_columns: row.merge_columns,
            enhance_types: row.enhance_types,
            file_ids: row.file_ids,
            model_service_id: row.model_service_id,
        })
    }
}

/// `data_task` backed job store
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn claim_one_pending(&self) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, kind, status, dataset_id, dataset_version_id, target_dataset_id,
                   version_name, file_filter, total, merge_columns, enhance_types,
                   file_ids, model_service_id
            FROM data_task
            WHERE status = $1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(JobStatus::Pending.code())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Job::try_from).transpose()
    }

    async fn transition(&self, job_id: i64, from: JobStatus, to: JobStatus) -> Result<u64> {
        if !from.can_transition_to(to) {
            debug!(job_id, from = %from, to = %to, "Rejected non-forward job status change");
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE data_task SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2",
        )
        .bind(job_id)
        .bind(from.code())
        .bind(to.code())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
