use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::constants::events;
use crate::models::JobStatus;
use crate::state_machine::{DatasetEvent, DatasetState};

/// Emitted after a lifecycle transition has been persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetTransitionEvent {
    pub dataset_id: i64,
    pub event: DatasetEvent,
    pub from: DatasetState,
    pub to: DatasetState,
}

/// Emitted after the claim loop finalises a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLifecycleEvent {
    pub job_id: i64,
    pub kind_code: i16,
    pub dataset_id: i64,
    pub status: JobStatus,
    /// Handler failure message, when the handler did not succeed
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchEvent {
    DatasetTransition(DatasetTransitionEvent),
    JobLifecycle(JobLifecycleEvent),
}

impl DispatchEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DatasetTransition(_) => events::DATASET_TRANSITIONED,
            Self::JobLifecycle(job) if job.status == JobStatus::Claimed => events::JOB_CLAIMED,
            Self::JobLifecycle(_) => events::JOB_FINALIZED,
        }
    }
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub event: DispatchEvent,
    pub published_at: DateTime<Utc>,
}

/// Broadcast publisher for dispatch and lifecycle events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event; having no subscribers is not an error
    pub fn publish(&self, event: DispatchEvent) {
        let name = event.name();
        let published = PublishedEvent {
            event,
            published_at: Utc::now(),
        };
        if self.sender.send(published).is_err() {
            tracing::trace!(event = name, "No event subscribers");
        }
    }

    pub fn publish_transition(&self, event: DatasetTransitionEvent) {
        self.publish(DispatchEvent::DatasetTransition(event));
    }

    pub fn publish_job(&self, event: JobLifecycleEvent) {
        self.publish(DispatchEvent::JobLifecycle(event));
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}
