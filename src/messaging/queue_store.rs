use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{DataTaskError, Result};

/// One member added to a sorted-set work queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub queue_key: String,
    pub member: String,
    pub score: f64,
}

/// Key/value store with sorted-set queues, such as Redis
#[async_trait]
pub trait WorkQueueStore: Send + Sync {
    /// Write every detail payload and queue entry in one round-trip.
    ///
    /// Not transactional: on error, a prefix of the writes may have been applied.
    async fn pipeline_write(
        &self,
        details: Vec<(String, String)>,
        entries: Vec<QueueEntry>,
    ) -> Result<()>;
}

#[derive(Debug, Default)]
struct QueueState {
    details: HashMap<String, String>,
    /// member -> score, per queue key
    queues: HashMap<String, HashMap<String, f64>>,
    writes: usize,
}

/// Sorted-set emulation: members ordered by score, then lexicographically
#[derive(Debug, Default)]
pub struct InMemoryWorkQueueStore {
    state: Mutex<QueueState>,
    /// Remaining writes before the next pipeline fails
    fail_after_writes: Mutex<Option<usize>>,
}

impl InMemoryWorkQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next pipeline fail after `writes` commands
    pub fn fail_after(&self, writes: usize) {
        *self.fail_after_writes.lock() = Some(writes);
    }

    pub fn detail(&self, key: &str) -> Option<String> {
        self.state.lock().details.get(key).cloned()
    }

    pub fn detail_count(&self) -> usize {
        self.state.lock().details.len()
    }

    /// Members of a queue in dequeue order
    pub fn members(&self, queue_key: &str) -> Vec<String> {
        let state = self.state.lock();
        let Some(members) = state.queues.get(queue_key) else {
            return Vec::new();
        };
        let mut ordered: Vec<(&String, f64)> = members.iter().map(|(m, s)| (m, *s)).collect();
        ordered.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        ordered.into_iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn score(&self, queue_key: &str, member: &str) -> Option<f64> {
        self.state.lock().queues.get(queue_key)?.get(member).copied()
    }

    pub fn queue_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state.lock().queues.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn total_writes(&self) -> usize {
        self.state.lock().writes
    }
}

#[async_trait]
impl WorkQueueStore for InMemoryWorkQueueStore {
    async fn pipeline_write(
        &self,
        details: Vec<(String, String)>,
        entries: Vec<QueueEntry>,
    ) -> Result<()> {
        let mut budget = self.fail_after_writes.lock().take();
        let mut state = self.state.lock();

        let mut check_budget = |applied: usize| -> Result<()> {
            if let Some(remaining) = budget.as_mut() {
                if *remaining == 0 {
                    return Err(DataTaskError::QueueStoreError(format!(
                        "connection reset after {applied} writes"
                    )));
                }
                *remaining -= 1;
            }
            Ok(())
        };

        for (key, payload) in details {
            check_budget(state.writes)?;
            state.details.insert(key, payload);
            state.writes += 1;
        }

        for entry in entries {
            check_budget(state.writes)?;
            state
                .queues
                .entry(entry.queue_key)
                .or_default()
                .insert(entry.member, entry.score);
            state.writes += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(queue_key: &str, member: &str, score: f64) -> QueueEntry {
        QueueEntry {
            queue_key: queue_key.to_string(),
            member: member.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn test_equal_scores_order_by_member() {
        let store = InMemoryWorkQueueStore::new();
        store
            .pipeline_write(
                Vec::new(),
                vec![entry("q", "c", 10.0), entry("q", "a", 10.0), entry("q", "b", 5.0)],
            )
            .await
            .unwrap();

        assert_eq!(store.members("q"), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_failure_leaves_prefix_applied() {
        let store = InMemoryWorkQueueStore::new();
        store.fail_after(3);

        let details = (0..4)
            .map(|i| (format!("d:{i}"), "{}".to_string()))
            .collect();
        let err = store
            .pipeline_write(details, vec![entry("q", "m", 10.0)])
            .await
            .unwrap_err();

        assert!(matches!(err, DataTaskError::QueueStoreError(_)));
        assert_eq!(store.detail_count(), 3);
        assert!(store.members("q").is_empty());

        // the injected failure is one-shot
        store
            .pipeline_write(Vec::new(), vec![entry("q", "m", 10.0)])
            .await
            .unwrap();
        assert_eq!(store.members("q"), vec!["m"]);
    }
}
