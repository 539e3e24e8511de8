//! # Dispatch Orchestration
//!
//! Claim-and-dispatch core of the data task engine.
//!
//! ## Core Components
//!
//! - **TaskClaimLoop**: polls the job store, wins claims through a conditional
//!   status update and runs exactly one handler per claimed job
//! - **HandlerRegistry**: job kind → [`handlers::JobHandler`]
//! - **TaskPartitioner**: pages file listings into bounded work units
//! - **DispatchContext**: explicit dependency container shared by the loop
//!   and every handler
//!
//! Queue keys and the pipelined queue write live in [`crate::messaging`];
//! dataset lifecycle transitions live in [`crate::state_machine`].

pub mod context;
pub mod handlers;
pub mod partitioner;
pub mod task_claimer;

pub use context::{DispatchAdapters, DispatchContext, InMemoryAdapters};
pub use handlers::{HandlerOutcome, HandlerRegistry, JobHandler};
pub use partitioner::{format_conversion_part_size, medical_annotation_path, TaskPartitioner};
pub use task_claimer::{ClaimOutcome, TaskClaimLoop};
