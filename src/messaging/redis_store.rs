//! Redis work queue store.
//!
//! Uses `redis::aio::ConnectionManager` for a multiplexed connection with
//! automatic reconnection. Detail payloads are plain `SET`s; queue entries are
//! `ZADD`s. Both are sent in one non-atomic pipeline per call.

use async_trait::async_trait;
use tracing::debug;

use super::queue_store::{QueueEntry, WorkQueueStore};
use crate::error::{DataTaskError, Result};

#[derive(Clone)]
pub struct RedisWorkQueueStore {
    connection_manager: redis::aio::ConnectionManager,
}

impl std::fmt::Debug for RedisWorkQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWorkQueueStore")
            .field("connection_manager", &"ConnectionManager")
            .finish()
    }
}

impl RedisWorkQueueStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            DataTaskError::QueueStoreError(format!("Failed to create Redis client: {e}"))
        })?;

        let connection_manager = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(|e| DataTaskError::QueueStoreError(format!("Failed to connect to Redis: {e}")))?;

        debug!(url = %redact_url(url), "Redis work queue store connected");

        Ok(Self { connection_manager })
    }

    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection_manager.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

#[async_trait]
impl WorkQueueStore for RedisWorkQueueStore {
    async fn pipeline_write(
        &self,
        details: Vec<(String, String)>,
        entries: Vec<QueueEntry>,
    ) -> Result<()> {
        let detail_count = details.len();
        let entry_count = entries.len();

        let mut pipe = redis::pipe();
        for (key, payload) in &details {
            pipe.cmd("SET").arg(key).arg(payload).ignore();
        }
        for entry in &entries {
            pipe.cmd("ZADD")
                .arg(&entry.queue_key)
                .arg(entry.score)
                .arg(&entry.member)
                .ignore();
        }

        let mut conn = self.connection_manager.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            DataTaskError::QueueStoreError(format!("Redis pipeline failed: {e}"))
        })?;

        debug!(
            details = detail_count,
            entries = entry_count,
            "Redis pipeline written"
        );
        Ok(())
    }
}

/// Redact credentials from a Redis URL for logging
pub(crate) fn redact_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let prefix = &url[..=colon_pos];
            let suffix = &url[at_pos..];
            return format!("{prefix}***{suffix}");
        }
    }
    url.to_string()
}
