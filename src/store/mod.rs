//! # Store Adapters
//!
//! Trait seams for the job store, the file/dataset catalogue, the search
//! index, the dataset lifecycle state and the dataset copier, plus in-memory
//! implementations. Postgres implementations live in [`crate::database`].

pub mod in_memory;
pub mod traits;

pub use in_memory::{
    DisabledSearchIndex, InMemoryDatasetStateStore, InMemoryJobStore, InMemoryMetadataStore,
    InMemorySearchIndex, RecordingDatasetCopier,
};
pub use traits::{
    CopyRequest, DatasetCopier, DatasetStateStore, FileMetadataProvider, FileWriter,
    IndexDocument, JobStore, MarkSummary, SearchIndex,
};
