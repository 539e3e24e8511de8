//! Error types for the dispatch engine.
//!
//! `DataTaskError` is the crate-wide error. Layer-specific errors
//! (state machine, configuration) convert into it so handlers and the claim
//! loop can propagate everything with `?`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataTaskError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Queue store error: {0}")]
    QueueStoreError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("Handler failed for job {job_id}: {reason}")]
    HandlerFailure { job_id: i64, reason: String },
    #[error("Partial publish failure for job {job_id} ({units} units): {reason}")]
    PartialPublishFailure {
        job_id: i64,
        units: usize,
        reason: String,
    },
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),
    #[error("State machine error: {0}")]
    StateMachineError(String),
    #[error("Table import error: {0}")]
    TableImportError(String),
}

impl DataTaskError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn handler_failure(job_id: i64, reason: impl Into<String>) -> Self {
        Self::HandlerFailure {
            job_id,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DataTaskError {
    fn from(error: serde_json::Error) -> Self {
        DataTaskError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

impl From<sqlx::Error> for DataTaskError {
    fn from(err: sqlx::Error) -> Self {
        DataTaskError::DatabaseError(err.to_string())
    }
}

impl From<redis::RedisError> for DataTaskError {
    fn from(err: redis::RedisError) -> Self {
        DataTaskError::QueueStoreError(err.to_string())
    }
}

impl From<csv::Error> for DataTaskError {
    fn from(err: csv::Error) -> Self {
        DataTaskError::TableImportError(err.to_string())
    }
}

impl From<std::io::Error> for DataTaskError {
    fn from(err: std::io::Error) -> Self {
        DataTaskError::TableImportError(format!("I/O error: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, DataTaskError>;
