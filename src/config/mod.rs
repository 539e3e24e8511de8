//! # Dispatcher Configuration
//!
//! Layered configuration for the claim loop, partitioner, queue publisher and
//! storage adapters. Values come from built-in defaults, an optional TOML file
//! and `DATATASK__*` environment variables, in that order of precedence.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use datatask_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let poll = manager.config().claim.poll_interval();
//! let page_size = manager.config().partition.page_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration object
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub claim: ClaimConfig,
    pub partition: PartitionConfig,
    pub queue: QueueConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl DispatchConfig {
    /// Reject values that would stall the loop or produce empty units
    pub fn validate(&self) -> ConfigResult<()> {
        if self.claim.poll_interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "claim.poll_interval_ms",
                "0",
                "poll interval must be positive",
            ));
        }
        if self.partition.page_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "partition.page_size",
                "0",
                "page size must be positive",
            ));
        }
        if self.partition.files_per_unit == 0 {
            return Err(ConfigurationError::invalid_value(
                "partition.files_per_unit",
                "0",
                "files per unit must be positive",
            ));
        }
        if self.partition.format_conversion_parts == 0 {
            return Err(ConfigurationError::invalid_value(
                "partition.format_conversion_parts",
                "0",
                "part count must be positive",
            ));
        }
        if self.partition.medical_batch_size == 0 || self.partition.table_import_chunk_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "partition",
                "0",
                "medical batch size and table import chunk size must be positive",
            ));
        }
        if self.storage.file_store_root.trim().is_empty() {
            return Err(ConfigurationError::MissingRequiredField {
                field: "file_store_root".to_string(),
                context: "storage".to_string(),
            });
        }
        Ok(())
    }
}

/// What the claim loop records for a job whose handler failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Failed jobs are finalised as done; failures are visible only in logs
    #[default]
    MarkDone,
    /// Failed jobs are finalised with the `failed` status
    MarkFailed,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClaimConfig {
    pub poll_interval_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl ClaimConfig {
    /// Get the gap between claim iterations as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: constants::DEFAULT_POLL_INTERVAL_MS,
            failure_policy: FailurePolicy::MarkDone,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub page_size: usize,
    pub files_per_unit: usize,
    pub format_conversion_parts: usize,
    pub medical_batch_size: usize,
    pub table_import_chunk_size: usize,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            page_size: constants::DEFAULT_PAGE_SIZE,
            files_per_unit: constants::DEFAULT_FILES_PER_UNIT,
            format_conversion_parts: constants::FORMAT_CONVERSION_PARTS,
            medical_batch_size: constants::MEDICAL_BATCH_SIZE,
            table_import_chunk_size: constants::TABLE_IMPORT_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub redis_url: String,
    pub priority_score: f64,
    pub task_prefix: String,
    pub detail_prefix: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            priority_score: constants::DEFAULT_PRIORITY_SCORE,
            task_prefix: constants::DEFAULT_TASK_QUEUE_PREFIX.to_string(),
            detail_prefix: constants::DEFAULT_DETAIL_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Prefix that turns storage-relative file urls into worker-visible paths
    pub file_store_root: String,
    pub bucket_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_store_root: constants::DEFAULT_FILE_STORE_ROOT.to_string(),
            bucket_name: "dataset".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/datatask_development".to_string(),
            max_connections: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// When set, a JSON log file is written here in addition to the console
    pub directory: Option<String>,
    pub json: bool,
}
