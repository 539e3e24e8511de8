use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{DataTaskError, Result};
use crate::state_machine::DatasetState;
use crate::store::DatasetStateStore;

/// Lifecycle state column of `data_dataset`
#[derive(Debug, Clone)]
pub struct PgDatasetStateStore {
    pool: PgPool,
}

impl PgDatasetStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DatasetStateStore for PgDatasetStateStore {
    async fn current_state(&self, dataset_id: i64) -> Result<Option<DatasetState>> {
        let code = sqlx::query_scalar::<_, i16>("SELECT state FROM data_dataset WHERE id = $1")
            .bind(dataset_id)
            .fetch_optional(&self.pool)
            .await?;

        code.map(|code| {
            DatasetState::from_code(code).ok_or_else(|| {
                DataTaskError::DatabaseError(format!(
                    "dataset {dataset_id} has unknown state code {code}"
                ))
            })
        })
        .transpose()
    }

    async fn compare_and_swap(
        &self,
        dataset_id: i64,
        expected: DatasetState,
        next: DatasetState,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE data_dataset SET state = $3, updated_at = NOW() WHERE id = $1 AND state = $2",
        )
        .bind(dataset_id)
        .bind(expected.code())
        .bind(next.code())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
