pub mod publisher;

pub use publisher::{
    DatasetTransitionEvent, DispatchEvent, EventPublisher, JobLifecycleEvent, PublishedEvent,
};
