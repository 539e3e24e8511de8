use std::sync::Arc;
use tracing::warn;

use super::errors::{PersistenceError, StateMachineError, StateMachineResult};
use super::states::DatasetState;
use crate::store::DatasetStateStore;

/// Compare-and-swap persistence of the dataset lifecycle state
#[derive(Clone)]
pub struct StatePersistence {
    store: Arc<dyn DatasetStateStore>,
}

impl std::fmt::Debug for StatePersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatePersistence").finish_non_exhaustive()
    }
}

impl StatePersistence {
    pub fn new(store: Arc<dyn DatasetStateStore>) -> Self {
        Self { store }
    }

    /// Resolve the current state; a dataset without one is an error
    pub async fn resolve_current_state(&self, dataset_id: i64) -> StateMachineResult<DatasetState> {
        self.store
            .current_state(dataset_id)
            .await
            .map_err(|e| PersistenceError::StateLoadFailed {
                reason: e.to_string(),
            })?
            .ok_or(StateMachineError::UnknownDataset { dataset_id })
    }

    /// Persist `expected → next`. A lost swap reports the state that won.
    pub async fn persist_transition(
        &self,
        dataset_id: i64,
        expected: DatasetState,
        next: DatasetState,
    ) -> StateMachineResult<()> {
        let swapped = self
            .store
            .compare_and_swap(dataset_id, expected, next)
            .await
            .map_err(|e| PersistenceError::StateSaveFailed {
                reason: e.to_string(),
            })?;

        if swapped {
            return Ok(());
        }

        let actual = self.store.current_state(dataset_id).await.ok().flatten();
        warn!(
            dataset_id = dataset_id,
            expected = %expected,
            actual = ?actual,
            "Dataset state changed concurrently"
        );
        Err(StateMachineError::ConcurrentModification {
            dataset_id,
            expected,
            actual,
        })
    }
}
