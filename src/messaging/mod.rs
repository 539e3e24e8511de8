//! # Work Queue Messaging
//!
//! Key routing, the work queue store seam (in-memory and Redis) and the
//! publisher that writes partitioned work units to it.

pub mod publisher;
pub mod queue_keys;
pub mod queue_store;
pub mod redis_store;

pub use publisher::{PublishReport, PublishedUnit, WorkQueuePublisher};
pub use queue_keys::{QueueKeyRouter, QueueRoute, RouteSegment};
pub use queue_store::{InMemoryWorkQueueStore, QueueEntry, WorkQueueStore};
pub use redis_store::RedisWorkQueueStore;
