//! Shared fixtures for the integration tests

#![allow(dead_code)]

pub mod builders;

pub use builders::*;

use datatask_core::config::DispatchConfig;

/// Default configuration with a short poll gap
pub fn test_config() -> DispatchConfig {
    let mut config = DispatchConfig::default();
    config.claim.poll_interval_ms = 100;
    config
}
