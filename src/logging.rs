//! # Structured Logging Module
//!
//! Environment-aware structured logging. Console output always; a JSON file
//! layer is added when a log directory is configured, so operators can search
//! for failed jobs (which are otherwise finalised silently).

use chrono::Utc;
use std::path::Path;
use std::process;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

static LOGGER_INITIALIZED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_structured_logging(config: &LoggingConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(std::io::IsTerminal::is_terminal(&std::io::stdout()))
            .with_filter(build_filter(&log_level));

        let (file_layer, guard) = match config.directory.as_deref() {
            Some(directory) => {
                let file_name = format!(
                    "{}.{}.{}.log",
                    environment,
                    process::id(),
                    Utc::now().format("%Y%m%d_%H%M%S")
                );
                let appender = tracing_appender::rolling::never(Path::new(directory), file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);
                let layer = fmt::layer()
                    .with_writer(writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(build_filter(&log_level));
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        let subscriber = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer);

        if subscriber.try_init().is_err() {
            // Another subscriber (test harness, embedding binary) already owns the global slot
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            log_directory = config.directory.as_deref().unwrap_or("-"),
            "Structured logging initialized"
        );

        guard
    });
}

/// `RUST_LOG` wins over the environment default
fn build_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn get_environment() -> String {
    std::env::var("DATATASK_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for job claim / finalisation
pub fn log_job_operation(
    operation: &str,
    job_id: i64,
    kind: Option<&str>,
    dataset_id: Option<i64>,
    status: &str,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        job_id = job_id,
        kind = kind,
        dataset_id = dataset_id,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "JOB_OPERATION"
    );
}

/// Log structured data for a queue publish
pub fn log_dispatch_operation(
    job_id: i64,
    queue_key: &str,
    units: usize,
    files: usize,
    status: &str,
) {
    tracing::info!(
        job_id = job_id,
        queue_key = %queue_key,
        units = units,
        files = files,
        status = %status,
        timestamp = %Utc::now().to_rfc3339(),
        "DISPATCH_OPERATION"
    );
}

/// Log structured data for a dataset lifecycle transition
pub fn log_state_transition(dataset_id: i64, event: &str, from: &str, to: &str) {
    tracing::info!(
        dataset_id = dataset_id,
        event = %event,
        from_state = %from,
        to_state = %to,
        timestamp = %Utc::now().to_rfc3339(),
        "STATE_TRANSITION"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "ERROR"
    );
}
