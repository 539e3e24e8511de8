//! # Data Task Dispatcher
//!
//! Runs the claim loop against Postgres and Redis until Ctrl-C.
//!
//! ```text
//! datatask-dispatcher [--config PATH] [--migrate] [--migrations-dir DIR]
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use datatask_core::config::ConfigManager;
use datatask_core::database::{
    DatabaseConnection, DatabaseMigrations, PgDatasetCopier, PgDatasetStateStore, PgJobStore,
    PgMetadataStore,
};
use datatask_core::logging::init_structured_logging;
use datatask_core::messaging::RedisWorkQueueStore;
use datatask_core::orchestration::{DispatchAdapters, DispatchContext, TaskClaimLoop};
use datatask_core::store::DisabledSearchIndex;

#[derive(Parser, Debug)]
#[command(name = "datatask-dispatcher")]
#[command(about = "Claim pending dataset jobs and publish their work units")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file (default: config/datatask.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Apply outstanding migrations before starting the loop
    #[arg(long)]
    migrate: bool,

    /// Directory holding the migration files
    #[arg(long, default_value = "migrations")]
    migrations_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let manager = ConfigManager::load_from_path(args.config.as_deref())
        .context("failed to load configuration")?;
    let config = manager.config().clone();
    init_structured_logging(&config.logging);

    info!(
        environment = %manager.environment(),
        source = ?manager.source_path(),
        "Starting data task dispatcher"
    );

    let database = DatabaseConnection::connect(&config.database)
        .await
        .context("failed to connect to Postgres")?;
    if args.migrate {
        let applied = DatabaseMigrations::run_outstanding(database.pool(), &args.migrations_dir)
            .await
            .context("failed to apply migrations")?;
        info!(applied = applied.len(), "Migrations applied");
    }

    let queue = RedisWorkQueueStore::connect(&config.queue.redis_url)
        .await
        .context("failed to connect to Redis")?;
    if !queue.health_check().await.context("Redis health check failed")? {
        bail!("Redis health check returned an unexpected reply");
    }

    let pool = database.pool().clone();
    let metadata = Arc::new(PgMetadataStore::new(pool.clone()));
    let adapters = DispatchAdapters {
        jobs: Arc::new(PgJobStore::new(pool.clone())),
        metadata: metadata.clone(),
        files: metadata,
        search_index: Arc::new(DisabledSearchIndex),
        dataset_states: Arc::new(PgDatasetStateStore::new(pool.clone())),
        copier: Arc::new(PgDatasetCopier::new(pool)),
        queue: Arc::new(queue),
    };

    let ctx = DispatchContext::new(config, adapters).context("invalid dispatcher configuration")?;
    let claim_loop = Arc::new(TaskClaimLoop::with_default_handlers(ctx.clone()));

    let shutdown = CancellationToken::new();
    let handle = claim_loop.spawn(shutdown.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    shutdown.cancel();
    handle.await.context("claim loop task failed")?;

    ctx.wait_for_background().await;
    database.close().await;
    info!("Dispatcher stopped");
    Ok(())
}
