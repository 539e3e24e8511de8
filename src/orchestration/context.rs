//! # Dispatch Context
//!
//! Explicit dependency container handed to the claim loop and every job
//! handler at construction. Production wiring uses the Postgres and Redis
//! adapters; tests substitute the in-memory ones through
//! [`InMemoryAdapters`].

use std::sync::Arc;
use tokio_util::task::TaskTracker;

use super::partitioner::TaskPartitioner;
use crate::config::{ConfigResult, DispatchConfig};
use crate::events::EventPublisher;
use crate::messaging::{InMemoryWorkQueueStore, QueueKeyRouter, WorkQueuePublisher, WorkQueueStore};
use crate::state_machine::DatasetStateMachine;
use crate::store::{
    DatasetCopier, DatasetStateStore, FileMetadataProvider, FileWriter, InMemoryDatasetStateStore,
    InMemoryJobStore, InMemoryMetadataStore, InMemorySearchIndex, JobStore, RecordingDatasetCopier,
    SearchIndex,
};

/// The external collaborators a context is built from
#[derive(Clone)]
pub struct DispatchAdapters {
    pub jobs: Arc<dyn JobStore>,
    pub metadata: Arc<dyn FileMetadataProvider>,
    pub files: Arc<dyn FileWriter>,
    pub search_index: Arc<dyn SearchIndex>,
    pub dataset_states: Arc<dyn DatasetStateStore>,
    pub copier: Arc<dyn DatasetCopier>,
    pub queue: Arc<dyn WorkQueueStore>,
}

/// Shared services for claiming and dispatching jobs
#[derive(Clone)]
pub struct DispatchContext {
    pub config: Arc<DispatchConfig>,
    pub jobs: Arc<dyn JobStore>,
    pub metadata: Arc<dyn FileMetadataProvider>,
    pub files: Arc<dyn FileWriter>,
    pub search_index: Arc<dyn SearchIndex>,
    pub copier: Arc<dyn DatasetCopier>,
    pub router: QueueKeyRouter,
    pub publisher: WorkQueuePublisher,
    pub partitioner: TaskPartitioner,
    pub state_machine: Arc<DatasetStateMachine>,
    pub events: EventPublisher,
    /// Detached work started by handlers (dataset copies)
    pub background: TaskTracker,
}

impl std::fmt::Debug for DispatchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchContext")
            .field("router", &self.router)
            .field("publisher", &self.publisher)
            .field("state_machine", &self.state_machine)
            .field("background_tasks", &self.background.len())
            .finish_non_exhaustive()
    }
}

impl DispatchContext {
    /// Build the context, rejecting a configuration that fails validation
    pub fn new(config: DispatchConfig, adapters: DispatchAdapters) -> ConfigResult<Self> {
        config.validate()?;

        let events = EventPublisher::default();
        let state_machine = Arc::new(DatasetStateMachine::new(
            adapters.dataset_states,
            adapters.metadata.clone(),
            events.clone(),
        ));
        let router = QueueKeyRouter::from_config(&config.queue);
        let publisher = WorkQueuePublisher::from_config(adapters.queue, &config);
        let partitioner = TaskPartitioner::new(
            adapters.metadata.clone(),
            config.partition.clone(),
            config.storage.file_store_root.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            jobs: adapters.jobs,
            metadata: adapters.metadata,
            files: adapters.files,
            search_index: adapters.search_index,
            copier: adapters.copier,
            router,
            publisher,
            partitioner,
            state_machine,
            events,
            background: TaskTracker::new(),
        })
    }

    /// Close the background tracker and wait for in-flight submissions
    pub async fn wait_for_background(&self) {
        self.background.close();
        self.background.wait().await;
    }
}

/// In-memory adapters, kept as concrete types so callers can seed and inspect them
#[derive(Debug, Clone, Default)]
pub struct InMemoryAdapters {
    pub jobs: Arc<InMemoryJobStore>,
    pub metadata: Arc<InMemoryMetadataStore>,
    pub search_index: Arc<InMemorySearchIndex>,
    pub dataset_states: Arc<InMemoryDatasetStateStore>,
    pub copier: Arc<RecordingDatasetCopier>,
    pub queue: Arc<InMemoryWorkQueueStore>,
}

impl InMemoryAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapters(&self) -> DispatchAdapters {
        DispatchAdapters {
            jobs: self.jobs.clone(),
            metadata: self.metadata.clone(),
            files: self.metadata.clone(),
            search_index: self.search_index.clone(),
            dataset_states: self.dataset_states.clone(),
            copier: self.copier.clone(),
            queue: self.queue.clone(),
        }
    }

    pub fn context(&self, config: DispatchConfig) -> ConfigResult<DispatchContext> {
        DispatchContext::new(config, self.adapters())
    }
}
