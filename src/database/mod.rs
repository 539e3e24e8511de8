//! # Postgres Adapters
//!
//! Production implementations of the store seams in [`crate::store`], built
//! on a shared `sqlx` pool. Queries are runtime-checked; status-like columns
//! are `SMALLINT` codes converted to model enums at the row boundary.
//!
//! - [`PgJobStore`]: `data_task` backlog and the conditional status update
//! - [`PgMetadataStore`]: dataset/file catalogue, read and write side
//! - [`PgDatasetStateStore`]: lifecycle state column with compare-and-swap
//! - [`PgDatasetCopier`]: transactional dataset copy
//! - [`DatabaseMigrations`]: applies `migrations/*.sql` in version order

pub mod connection;
pub mod dataset_copier;
pub mod dataset_state_store;
pub mod job_store;
pub mod metadata_store;
pub mod migrations;

pub use connection::DatabaseConnection;
pub use dataset_copier::PgDatasetCopier;
pub use dataset_state_store::PgDatasetStateStore;
pub use job_store::PgJobStore;
pub use metadata_store::PgMetadataStore;
pub use migrations::{DatabaseMigrations, Migration};
