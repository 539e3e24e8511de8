//! # Domain Models
//!
//! Plain data types shared by the adapters, the partitioner, the publisher
//! and the state machine.
//!
//! ## Overview
//!
//! - [`Job`]: a claimable unit of dataset-processing work
//! - [`Dataset`], [`DatasetVersion`], [`Label`]: dataset metadata attached to units
//! - [`FileRecord`], [`MedicalFile`], [`VersionFile`]: file listings
//! - [`WorkUnit`]: a published batch of files
//!
//! Status-like fields are enums with explicit numeric codes matching the
//! persisted `SMALLINT` columns; conversion happens only in the adapters.

pub mod dataset;
pub mod file;
pub mod job;
pub mod work_unit;

pub use dataset::{Dataset, DatasetVersion, Label, LabelType};
pub use file::{AnnotationStatus, FileRecord, MarkStatus, MedicalFile, NewFileRecord, VersionFile};
pub use job::{FileFilter, Job, JobKind, JobStatus};
pub use work_unit::{QueueTag, UnitFile, UnitParams, WorkUnit};
