use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::Result;
use crate::store::{CopyRequest, DatasetCopier};

/// Copies version files and labels into the target dataset in one transaction.
///
/// Copied rows keep their storage urls; the target's current version (when it
/// has one) receives the new files.
#[derive(Debug, Clone)]
pub struct PgDatasetCopier {
    pool: PgPool,
}

impl PgDatasetCopier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetCopier for PgDatasetCopier {
    #[instrument(skip_all, fields(job_id = request.job_id, origin = request.origin.id, target = request.target.id))]
    async fn copy_dataset(&self, request: CopyRequest) -> Result<()> {
        let file_ids: Vec<i64> = request.files.iter().map(|f| f.file_id).collect();
        let mut tx = self.pool.begin().await?;

        let new_ids = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO data_file (dataset_id, name, url, annotation_status, mark_status, exclude_header, text_content)
            SELECT $1, name, url, annotation_status, mark_status, exclude_header, text_content
            FROM data_file
            WHERE id = ANY($2)
            ORDER BY id
            RETURNING id
            "#,
        )
        .bind(request.target.id)
        .bind(&file_ids)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO data_label (dataset_id, name)
            SELECT $1, name FROM data_label WHERE dataset_id = $2
            "#,
        )
        .bind(request.target.id)
        .bind(request.origin.id)
        .execute(&mut *tx)
        .await?;

        if let Some(version) = &request.target.current_version_name {
            sqlx::query(
                r#"
                INSERT INTO data_version_file (dataset_id, version_name, file_id)
                SELECT $1, $2, UNNEST($3::bigint[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(request.target.id)
            .bind(version)
            .bind(&new_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            job_id = request.job_id,
            version = %request.version_name,
            copied = new_ids.len(),
            "Dataset copy committed"
        );
        Ok(())
    }
}
