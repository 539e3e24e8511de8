mod common;

use async_trait::async_trait;
use common::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use datatask_core::config::{ConfigurationError, FailurePolicy};
use datatask_core::constants::events;
use datatask_core::error::{DataTaskError, Result};
use datatask_core::events::DispatchEvent;
use datatask_core::models::{AnnotationStatus, Job, JobKind, JobStatus};
use datatask_core::orchestration::{
    ClaimOutcome, DispatchContext, HandlerOutcome, HandlerRegistry, InMemoryAdapters, JobHandler,
    TaskClaimLoop,
};
use datatask_core::store::JobStore;

struct FailingHandler;

#[async_trait]
impl JobHandler for FailingHandler {
    fn kind(&self) -> JobKind {
        JobKind::Augmentation
    }

    async fn handle(&self, _ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        Err(DataTaskError::handler_failure(job.id, "worker image missing"))
    }
}

/// Finishes the job itself, leaving nothing for the loop to finalise
struct SelfFinalizingHandler;

#[async_trait]
impl JobHandler for SelfFinalizingHandler {
    fn kind(&self) -> JobKind {
        JobKind::Augmentation
    }

    async fn handle(&self, ctx: &DispatchContext, job: &Job) -> Result<HandlerOutcome> {
        ctx.jobs
            .transition(job.id, JobStatus::Claimed, JobStatus::Done)
            .await?;
        Ok(HandlerOutcome::Published {
            queue_key: "task_queue:imgprocess:7:0".to_string(),
            units: 0,
            files: 0,
        })
    }
}

fn annotation_adapters(jobs: &[i64]) -> InMemoryAdapters {
    let adapters = InMemoryAdapters::new();
    DatasetBuilder::new(7).with_version("V0001").build(&adapters.metadata);
    seed_files(&adapters.metadata, 7, 1, 40, AnnotationStatus::NotAnnotated, Some("V0001"));
    for &id in jobs {
        adapters.jobs.insert(job(id, JobKind::StandardAnnotation, 7));
    }
    adapters
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_have_single_winner() {
    let adapters = annotation_adapters(&[11]);
    let store = adapters.jobs.clone();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .transition(11, JobStatus::Pending, JobStatus::Claimed)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        winners += handle.await.unwrap();
    }
    assert_eq!(winners, 1);
    assert_eq!(store.status(11), Some(JobStatus::Claimed));
}

#[tokio::test]
async fn test_job_status_never_moves_backward_or_skips() {
    let adapters = annotation_adapters(&[1, 2]);
    let store = adapters.jobs.clone();

    assert_eq!(store.transition(1, JobStatus::Pending, JobStatus::Claimed).await.unwrap(), 1);
    assert_eq!(store.transition(1, JobStatus::Claimed, JobStatus::Done).await.unwrap(), 1);

    assert_eq!(store.transition(1, JobStatus::Done, JobStatus::Pending).await.unwrap(), 0);
    assert_eq!(store.transition(1, JobStatus::Done, JobStatus::Claimed).await.unwrap(), 0);
    assert_eq!(store.status(1), Some(JobStatus::Done));

    assert_eq!(store.transition(2, JobStatus::Pending, JobStatus::Done).await.unwrap(), 0);
    assert_eq!(store.transition(2, JobStatus::Pending, JobStatus::Failed).await.unwrap(), 0);
    assert_eq!(store.status(2), Some(JobStatus::Pending));
    assert_eq!(store.pending_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loops_dispatch_job_once() {
    let adapters = annotation_adapters(&[21]);
    let ctx = adapters.context(test_config()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let claim_loop = Arc::new(TaskClaimLoop::with_default_handlers(ctx.clone()));
            tokio::spawn(async move { claim_loop.run_once().await.unwrap() })
        })
        .collect();

    let mut dispatched = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ClaimOutcome::Dispatched { job_id, .. } => {
                assert_eq!(job_id, 21);
                dispatched += 1;
            }
            ClaimOutcome::LostRace { job_id } => assert_eq!(job_id, 21),
            ClaimOutcome::Idle => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    assert_eq!(dispatched, 1);
    assert_eq!(adapters.jobs.status(21), Some(JobStatus::Done));
    assert_eq!(adapters.queue.queue_keys(), vec!["task_queue:annotation:7:21".to_string()]);
}

#[tokio::test]
async fn test_handler_error_marks_done_by_default() {
    let adapters = annotation_adapters(&[]);
    adapters.jobs.insert(job(3, JobKind::Augmentation, 7));
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(FailingHandler));
    let claim_loop = TaskClaimLoop::new(adapters.context(test_config()).unwrap(), registry);

    let outcome = claim_loop.run_once().await.unwrap();
    match outcome {
        ClaimOutcome::Dispatched { status, error, outcome, .. } => {
            assert_eq!(status, JobStatus::Done);
            assert!(outcome.is_none());
            assert!(error.unwrap().contains("worker image missing"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    // failed jobs are not re-queued
    assert_eq!(claim_loop.run_once().await.unwrap(), ClaimOutcome::Idle);
}

#[tokio::test]
async fn test_handler_error_marks_failed_when_configured() {
    let adapters = annotation_adapters(&[]);
    adapters.jobs.insert(job(3, JobKind::Augmentation, 7));
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(FailingHandler));
    let mut config = test_config();
    config.claim.failure_policy = FailurePolicy::MarkFailed;
    let claim_loop = TaskClaimLoop::new(adapters.context(config).unwrap(), registry);

    claim_loop.run_once().await.unwrap();
    assert_eq!(adapters.jobs.status(3), Some(JobStatus::Failed));
}

#[tokio::test]
async fn test_lifecycle_events_published() {
    let adapters = annotation_adapters(&[4]);
    let claim_loop = TaskClaimLoop::with_default_handlers(adapters.context(test_config()).unwrap());
    let mut receiver = claim_loop.context().events.subscribe();

    claim_loop.run_once().await.unwrap();

    let claimed = receiver.recv().await.unwrap();
    assert_eq!(claimed.event.name(), events::JOB_CLAIMED);
    let finalized = receiver.recv().await.unwrap();
    assert_eq!(finalized.event.name(), events::JOB_FINALIZED);
    match finalized.event {
        DispatchEvent::JobLifecycle(event) => {
            assert_eq!(event.job_id, 4);
            assert_eq!(event.status, JobStatus::Done);
            assert!(event.error.is_none());
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_loop_claims_one_job_per_poll_interval() {
    let adapters = annotation_adapters(&[1, 2, 3]);
    let claim_loop = Arc::new(TaskClaimLoop::with_default_handlers(adapters.context(test_config()).unwrap()));
    let shutdown = CancellationToken::new();
    let handle = claim_loop.clone().spawn(shutdown.clone());

    // iterations at t = 0ms and t = 100ms
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(adapters.jobs.pending_count(), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(adapters.jobs.pending_count(), 0);

    shutdown.cancel();
    handle.await.unwrap();
    for id in 1..=3 {
        assert_eq!(adapters.jobs.status(id), Some(JobStatus::Done));
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_loop_stops_promptly() {
    let adapters = annotation_adapters(&[]);
    let claim_loop = Arc::new(TaskClaimLoop::with_default_handlers(adapters.context(test_config()).unwrap()));
    let shutdown = CancellationToken::new();
    let handle = claim_loop.spawn(shutdown.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();
    tokio::time::timeout(Duration::from_millis(10), handle)
        .await
        .expect("claim loop did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_context_rejects_invalid_partition_config() {
    let adapters = annotation_adapters(&[]);

    let mut config = test_config();
    config.partition.page_size = 0;
    assert!(matches!(
        adapters.context(config),
        Err(ConfigurationError::InvalidValue { .. })
    ));

    let mut config = test_config();
    config.partition.files_per_unit = 0;
    assert!(matches!(
        adapters.context(config),
        Err(ConfigurationError::InvalidValue { .. })
    ));
}

#[tokio::test]
async fn test_lost_finalisation_is_reported() {
    let adapters = annotation_adapters(&[]);
    adapters.jobs.insert(job(8, JobKind::Augmentation, 7));
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(SelfFinalizingHandler));
    let claim_loop = TaskClaimLoop::new(adapters.context(test_config()).unwrap(), registry);
    let mut receiver = claim_loop.context().events.subscribe();

    let outcome = claim_loop.run_once().await.unwrap();
    assert_eq!(
        outcome,
        ClaimOutcome::FinalizationLost {
            job_id: 8,
            attempted: JobStatus::Done,
            error: None,
        }
    );

    let claimed = receiver.recv().await.unwrap();
    assert_eq!(claimed.event.name(), events::JOB_CLAIMED);
    // no finalisation event for a status the loop never wrote
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_partial_publish_leaves_written_units_and_finishes_job() {
    // 40 files at 16 per unit: three units, only the first detail lands
    let adapters = annotation_adapters(&[31]);
    adapters.queue.fail_after(1);
    let claim_loop = TaskClaimLoop::with_default_handlers(adapters.context(test_config()).unwrap());

    let outcome = claim_loop.run_once().await.unwrap();
    match outcome {
        ClaimOutcome::Dispatched { job_id, status, outcome, error } => {
            assert_eq!(job_id, 31);
            assert_eq!(status, JobStatus::Done);
            assert!(outcome.is_none());
            let error = error.unwrap();
            assert!(error.contains("Partial publish failure for job 31"), "{error}");
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    assert_eq!(adapters.jobs.status(31), Some(JobStatus::Done));
    assert_eq!(adapters.queue.detail_count(), 1);
    assert!(adapters.queue.members("task_queue:annotation:7:31").is_empty());
}
