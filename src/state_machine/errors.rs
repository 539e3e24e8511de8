use thiserror::Error;

use super::events::DatasetEvent;
use super::states::DatasetState;
use crate::error::DataTaskError;

/// Errors raised while applying a dataset lifecycle event
#[derive(Error, Debug)]
pub enum StateMachineError {
    #[error("Guard rejected {event} in state {state}: {source}")]
    GuardFailed {
        state: DatasetState,
        event: DatasetEvent,
        #[source]
        source: GuardError,
    },

    #[error("Event {event} is not permitted in state {state}")]
    IllegalTransition {
        state: DatasetState,
        event: DatasetEvent,
    },

    #[error("Dataset {dataset_id} changed concurrently: expected {expected}, now {actual:?}")]
    ConcurrentModification {
        dataset_id: i64,
        expected: DatasetState,
        actual: Option<DatasetState>,
    },

    #[error("Dataset {dataset_id} has no lifecycle state")]
    UnknownDataset { dataset_id: i64 },

    #[error("Persistence failed: {0}")]
    PersistenceFailed(#[from] PersistenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Files not ready: {reason}")]
    FilesNotReady { reason: String },

    #[error("Business rule violation: {rule}")]
    BusinessRuleViolation { rule: String },

    #[error("Guard lookup failed: {0}")]
    LookupFailed(String),
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Failed to save state: {reason}")]
    StateSaveFailed { reason: String },

    #[error("Failed to load state: {reason}")]
    StateLoadFailed { reason: String },
}

pub type StateMachineResult<T> = Result<T, StateMachineError>;
pub type GuardResult<T> = Result<T, GuardError>;
pub type PersistenceResult<T> = Result<T, PersistenceError>;

pub fn files_not_ready(reason: impl Into<String>) -> GuardError {
    GuardError::FilesNotReady {
        reason: reason.into(),
    }
}

pub fn business_rule_violation(rule: impl Into<String>) -> GuardError {
    GuardError::BusinessRuleViolation { rule: rule.into() }
}

impl From<DataTaskError> for GuardError {
    fn from(err: DataTaskError) -> Self {
        GuardError::LookupFailed(err.to_string())
    }
}

impl From<StateMachineError> for DataTaskError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::GuardFailed { .. } | StateMachineError::IllegalTransition { .. } => {
                DataTaskError::IllegalTransition(err.to_string())
            }
            StateMachineError::UnknownDataset { dataset_id } => {
                DataTaskError::not_found("dataset state", dataset_id)
            }
            other => DataTaskError::StateMachineError(other.to_string()),
        }
    }
}
