//! Queue key routing.
//!
//! Keys have the shape `{prefix}:{segment}:{dataset_id}:{job_id}[:{sub_task_id}]`.
//! The segment is the algorithm tag, or the job's model service id when the
//! job targets an alternate worker deployment. Since the segment never
//! contains `:` and both ids are numeric, two jobs with different
//! `(dataset_id, job_id)` pairs never share a key.

use std::fmt;

use crate::config::QueueConfig;
use crate::models::{Job, QueueTag};

/// Routing segment of a queue key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteSegment {
    Tag(QueueTag),
    ModelService(i64),
}

impl fmt::Display for RouteSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag.as_str()),
            Self::ModelService(id) => write!(f, "{id}"),
        }
    }
}

/// Builds queue routes from the configured prefixes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueKeyRouter {
    task_prefix: String,
    detail_prefix: String,
}

impl QueueKeyRouter {
    pub fn new(task_prefix: impl Into<String>, detail_prefix: impl Into<String>) -> Self {
        Self {
            task_prefix: task_prefix.into(),
            detail_prefix: detail_prefix.into(),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.task_prefix.clone(), config.detail_prefix.clone())
    }

    /// Route for one job's units of the given algorithm
    pub fn route(&self, tag: QueueTag, job: &Job) -> QueueRoute {
        let segment = match job.model_service_id {
            Some(service_id) => RouteSegment::ModelService(service_id),
            None => RouteSegment::Tag(tag),
        };
        QueueRoute {
            task_prefix: self.task_prefix.clone(),
            detail_prefix: self.detail_prefix.clone(),
            segment,
            dataset_id: job.dataset_id,
            job_id: job.id,
        }
    }
}

impl Default for QueueKeyRouter {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

/// Resolved keys for one job and algorithm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRoute {
    task_prefix: String,
    detail_prefix: String,
    pub segment: RouteSegment,
    pub dataset_id: i64,
    pub job_id: i64,
}

impl QueueRoute {
    /// Sorted-set key workers poll for sub-task ids
    pub fn queue_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.task_prefix, self.segment, self.dataset_id, self.job_id
        )
    }

    /// Key holding the full payload of one sub-task
    pub fn detail_key(&self, sub_task_id: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            self.detail_prefix, self.segment, self.dataset_id, self.job_id, sub_task_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobKind;

    fn job(dataset_id: i64, job_id: i64) -> Job {
        Job::new(job_id, JobKind::StandardAnnotation, dataset_id)
    }

    #[test]
    fn test_keys_are_stable() {
        let router = QueueKeyRouter::default();
        let route = router.route(QueueTag::Annotation, &job(7, 9));

        assert_eq!(route.queue_key(), "task_queue:annotation:7:9");
        assert_eq!(route.detail_key("abc"), "task_detail:annotation:7:9:abc");
        assert_eq!(router.route(QueueTag::Annotation, &job(7, 9)), route);
    }

    #[test]
    fn test_model_service_replaces_tag_in_both_keys() {
        let router = QueueKeyRouter::default();
        let mut job = job(7, 9);
        job.model_service_id = Some(31);
        let route = router.route(QueueTag::Track, &job);

        assert_eq!(route.queue_key(), "task_queue:31:7:9");
        assert_eq!(route.detail_key("abc"), "task_detail:31:7:9:abc");
        assert!(!route.queue_key().contains("track"));
    }

    #[test]
    fn test_distinct_jobs_never_collide() {
        let router = QueueKeyRouter::new("q", "d");
        let a = router.route(QueueTag::Ofrecord, &job(1, 23));
        let b = router.route(QueueTag::Ofrecord, &job(12, 3));
        assert_ne!(a.queue_key(), b.queue_key());
        assert_ne!(a.detail_key("x"), b.detail_key("x"));
    }
}
