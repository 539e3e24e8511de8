#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Data Task Core
//!
//! Job-dispatch engine for dataset preparation work.
//!
//! ## Overview
//!
//! A long-lived claim loop polls the job store for pending jobs (annotation,
//! format conversion, tracking, augmentation, medical segmentation, text
//! classification, table import, dataset copy), wins each claim through a
//! conditional status update, and hands the job to exactly one handler. The
//! handler partitions the job's files into bounded work units and publishes
//! them to per-algorithm priority queues in one pipelined write; external
//! worker pools consume the queues.
//!
//! Independently, each dataset carries a lifecycle state (importing,
//! labeling, published, ...) driven by an event-based state machine with
//! guarded, compare-and-swap persisted transitions.
//!
//! ## Module Organization
//!
//! - [`orchestration`] - Claim loop, handlers, partitioner and dispatch context
//! - [`messaging`] - Queue key routing, work queue publisher and queue stores
//! - [`state_machine`] - Dataset lifecycle state machine
//! - [`store`] - Adapter traits and in-memory implementations
//! - [`database`] - Postgres adapters and migrations
//! - [`models`] - Jobs, files, datasets and work units
//! - [`events`] - Broadcast of job and dataset lifecycle events
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use datatask_core::config::DispatchConfig;
//! use datatask_core::models::{Job, JobKind};
//! use datatask_core::orchestration::{InMemoryAdapters, TaskClaimLoop};
//!
//! # async fn example() -> datatask_core::Result<()> {
//! let adapters = InMemoryAdapters::new();
//! adapters.jobs.insert(Job::new(1, JobKind::StandardAnnotation, 42));
//!
//! let claim_loop = TaskClaimLoop::with_default_handlers(adapters.context(DispatchConfig::default())?);
//! let outcome = claim_loop.run_once().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod orchestration;
pub mod state_machine;
pub mod store;

pub use config::{ConfigManager, DispatchConfig, FailurePolicy};
pub use error::{DataTaskError, Result};
pub use events::{DispatchEvent, EventPublisher};
pub use messaging::{QueueKeyRouter, WorkQueuePublisher};
pub use models::{Job, JobKind, JobStatus, QueueTag, WorkUnit};
pub use orchestration::{ClaimOutcome, DispatchContext, HandlerRegistry, TaskClaimLoop, TaskPartitioner};
pub use state_machine::{DatasetEvent, DatasetState, DatasetStateMachine, TransitionOutcome};
