//! # Task Claim Loop
//!
//! A single long-lived task that polls the job store, claims at most one
//! pending job per iteration and dispatches it to exactly one handler.
//!
//! ## Claim protocol
//!
//! 1. `claim_one_pending` selects a candidate (oldest first).
//! 2. `transition(pending → claimed)` decides ownership. Zero affected rows
//!    means another replica won; the iteration ends quietly.
//! 3. The handler runs with panics caught at this boundary.
//! 4. The job is finalised `claimed → done`, or `claimed → failed` when the
//!    handler failed and the failure policy is `mark_failed`. Failed jobs are
//!    never re-queued. If the job already left `claimed`, nothing is written
//!    and the iteration reports [`ClaimOutcome::FinalizationLost`].
//!
//! The loop sleeps `claim.poll_interval_ms` after every iteration, whatever
//! the iteration did, and exits when its cancellation token fires.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::context::DispatchContext;
use super::handlers::{HandlerOutcome, HandlerRegistry};
use crate::config::FailurePolicy;
use crate::error::{DataTaskError, Result};
use crate::events::JobLifecycleEvent;
use crate::logging::{log_error, log_job_operation};
use crate::models::{Job, JobStatus};

/// What one loop iteration did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// No pending job
    Idle,
    /// Another caller claimed the candidate first
    LostRace { job_id: i64 },
    Dispatched {
        job_id: i64,
        status: JobStatus,
        outcome: Option<HandlerOutcome>,
        error: Option<String>,
    },
    /// The handler ran but the job had left `claimed` before it could be
    /// finalised, so `attempted` was never recorded
    FinalizationLost {
        job_id: i64,
        attempted: JobStatus,
        error: Option<String>,
    },
}

pub struct TaskClaimLoop {
    ctx: DispatchContext,
    registry: HandlerRegistry,
    poll_interval: Duration,
    failure_policy: FailurePolicy,
}

impl std::fmt::Debug for TaskClaimLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskClaimLoop")
            .field("registry", &self.registry)
            .field("poll_interval", &self.poll_interval)
            .field("failure_policy", &self.failure_policy)
            .finish()
    }
}

impl TaskClaimLoop {
    pub fn new(ctx: DispatchContext, registry: HandlerRegistry) -> Self {
        let poll_interval = ctx.config.claim.poll_interval();
        let failure_policy = ctx.config.claim.failure_policy;
        Self {
            ctx,
            registry,
            poll_interval,
            failure_policy,
        }
    }

    /// Loop with a handler for every job kind
    pub fn with_default_handlers(ctx: DispatchContext) -> Self {
        Self::new(ctx, HandlerRegistry::with_default_handlers())
    }

    pub fn context(&self) -> &DispatchContext {
        &self.ctx
    }

    /// Run iterations until `shutdown` is cancelled
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            failure_policy = ?self.failure_policy,
            "Claim loop started"
        );

        while !shutdown.is_cancelled() {
            if let Err(error) = self.run_once().await {
                log_error("TaskClaimLoop", "run_once", &error.to_string(), None);
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!("Claim loop stopped");
    }

    /// Run the loop on its own task
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// One poll: claim at most one job and dispatch it.
    ///
    /// Errors are job-store failures only; handler failures are captured in
    /// [`ClaimOutcome::Dispatched`].
    pub async fn run_once(&self) -> Result<ClaimOutcome> {
        let Some(job) = self.ctx.jobs.claim_one_pending().await? else {
            return Ok(ClaimOutcome::Idle);
        };

        let claimed = self
            .ctx
            .jobs
            .transition(job.id, JobStatus::Pending, JobStatus::Claimed)
            .await?;
        if claimed == 0 {
            debug!(job_id = job.id, "Job claimed by another dispatcher");
            return Ok(ClaimOutcome::LostRace { job_id: job.id });
        }

        let kind_name = job.kind().map(|kind| kind.as_str());
        log_job_operation("claim", job.id, kind_name, Some(job.dataset_id), "claimed", None);
        self.publish_lifecycle(&job, JobStatus::Claimed, None);

        let result = self.dispatch(&job).await;
        let (outcome, error) = match result {
            Ok(outcome) => (Some(outcome), None),
            Err(error) => (None, Some(error.to_string())),
        };

        let status = match (&error, self.failure_policy) {
            (Some(_), FailurePolicy::MarkFailed) => JobStatus::Failed,
            _ => JobStatus::Done,
        };
        let finalized = self
            .ctx
            .jobs
            .transition(job.id, JobStatus::Claimed, status)
            .await?;
        if finalized == 0 {
            warn!(job_id = job.id, status = %status, "Job was no longer claimed at finalisation");
            return Ok(ClaimOutcome::FinalizationLost {
                job_id: job.id,
                attempted: status,
                error,
            });
        }

        log_job_operation(
            "finalize",
            job.id,
            kind_name,
            Some(job.dataset_id),
            &status.to_string(),
            error.as_deref(),
        );
        self.publish_lifecycle(&job, status, error.clone());

        Ok(ClaimOutcome::Dispatched {
            job_id: job.id,
            status,
            outcome,
            error,
        })
    }

    #[instrument(skip_all, fields(job_id = job.id, kind_code = job.kind_code))]
    async fn dispatch(&self, job: &Job) -> Result<HandlerOutcome> {
        let Some(kind) = job.kind() else {
            warn!(job_id = job.id, kind_code = job.kind_code, "Unrecognised job kind");
            return Err(DataTaskError::handler_failure(
                job.id,
                format!("unrecognised job kind code {}", job.kind_code),
            ));
        };
        let Some(handler) = self.registry.get(kind) else {
            warn!(job_id = job.id, kind = %kind, "No handler registered for job kind");
            return Err(DataTaskError::handler_failure(
                job.id,
                format!("no handler registered for {kind}"),
            ));
        };

        match AssertUnwindSafe(handler.handle(&self.ctx, job))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => {
                debug!(job_id = job.id, outcome = ?outcome, "Handler completed");
                Ok(outcome)
            }
            Ok(Err(error)) => {
                log_error(
                    "TaskClaimLoop",
                    kind.as_str(),
                    &error.to_string(),
                    Some(&format!("job_id={} dataset_id={}", job.id, job.dataset_id)),
                );
                Err(error)
            }
            Err(panic) => {
                let panic_msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                log_error(
                    "TaskClaimLoop",
                    kind.as_str(),
                    &format!("handler panicked: {panic_msg}"),
                    Some(&format!("job_id={}", job.id)),
                );
                Err(DataTaskError::handler_failure(
                    job.id,
                    format!("handler panicked: {panic_msg}"),
                ))
            }
        }
    }

    fn publish_lifecycle(&self, job: &Job, status: JobStatus, error: Option<String>) {
        self.ctx.events.publish_job(JobLifecycleEvent {
            job_id: job.id,
            kind_code: job.kind_code,
            dataset_id: job.dataset_id,
            status,
            error,
        });
    }
}
