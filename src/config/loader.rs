//! Configuration Loader
//!
//! Environment-aware loading built on the `config` crate. Sources, lowest
//! precedence first:
//!
//! 1. `DispatchConfig::default()` (via `#[serde(default)]`)
//! 2. A TOML file: an explicit path, or `config/datatask.toml` when present
//! 3. Environment variables `DATATASK__<SECTION>__<KEY>`

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::DispatchConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/datatask.toml";
pub const ENV_PREFIX: &str = "DATATASK";

/// Loaded configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: DispatchConfig,
    environment: String,
    source_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration with the default file location
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_path(None)
    }

    /// Load configuration from an explicit file (which must exist) or the default location
    pub fn load_from_path(path: Option<&Path>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        let mut builder = config::Config::builder();
        let source_path = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigurationError::ConfigFileNotFound {
                        path: path.to_path_buf(),
                    });
                }
                builder = builder.add_source(config::File::from(path).required(true));
                Some(path.to_path_buf())
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                builder =
                    builder.add_source(config::File::from(default_path.as_path()).required(false));
                default_path.exists().then_some(default_path)
            }
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: DispatchConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        debug!(
            source = ?source_path,
            environment = %environment,
            "Configuration sources merged"
        );
        info!(
            environment = %environment,
            poll_interval_ms = config.claim.poll_interval_ms,
            page_size = config.partition.page_size,
            failure_policy = ?config.claim.failure_policy,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            source_path,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: DispatchConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            source_path: None,
        }))
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    /// Current deployment environment, `development` when unset
    pub fn detect_environment() -> String {
        std::env::var("DATATASK_ENV")
            .or_else(|_| std::env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }
}
