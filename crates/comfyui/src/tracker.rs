//! Job tracking for submitted runs.
//!
//! [`JobTracker`] submits prepared graphs to an [`ExecutionEngine`],
//! records each accepted run as a [`Job`] in a bounded [`JobHistory`],
//! and spawns one poller task per job that drives it to a terminal
//! state. Pollers are registered by job id with a child
//! [`CancellationToken`] so they can be stopped individually (via
//! [`JobTracker::stop`]) or all at once (via [`JobTracker::shutdown`]).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use comfyremote_core::engine::{ExecutionEngine, HistoryEntry};
use comfyremote_core::error::CoreError;
use comfyremote_core::job::{Job, JobHistory, JobOutcome};
use comfyremote_core::run::ResolvedRun;
use comfyremote_core::types::ExecutionId;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::backoff::{next_delay, PollConfig};

/// How long [`JobTracker::shutdown`] waits for pollers to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Registry of live pollers, keyed by job id.
type PollerRegistry = Arc<Mutex<HashMap<ExecutionId, CancellationToken>>>;

/// Owns the job history and every poller task.
///
/// Created once at startup and shared through `Arc` with request handlers.
pub struct JobTracker {
    engine: Arc<dyn ExecutionEngine>,
    history: Arc<RwLock<JobHistory>>,
    pollers: PollerRegistry,
    tasks: TaskTracker,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
    config: PollConfig,
    /// Client id sent with every submission.
    client_id: String,
    /// Path prefix used to build artifact view URLs.
    view_base: String,
}

/// Everything a poller task needs, cloned out of the tracker.
#[derive(Clone)]
struct PollContext {
    engine: Arc<dyn ExecutionEngine>,
    history: Arc<RwLock<JobHistory>>,
    pollers: PollerRegistry,
    config: PollConfig,
    view_base: String,
}

impl JobTracker {
    pub fn new(
        engine: Arc<dyn ExecutionEngine>,
        history_capacity: usize,
        config: PollConfig,
        view_base: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            history: Arc::new(RwLock::new(JobHistory::new(history_capacity))),
            pollers: Arc::new(Mutex::new(HashMap::new())),
            tasks: TaskTracker::new(),
            cancel: CancellationToken::new(),
            config,
            client_id: uuid::Uuid::new_v4().to_string(),
            view_base: view_base.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Submit a prepared run and start polling it.
    ///
    /// Returns the freshly queued job without waiting for execution.
    /// Nothing is recorded if the engine refuses the submission.
    pub async fn submit(&self, workflow_name: &str, run: ResolvedRun) -> Result<Job, CoreError> {
        let job_id = self.engine.submit(&run.graph, &self.client_id).await?;

        let job = Job::queued(
            job_id.clone(),
            workflow_name.to_string(),
            run.applied_overrides,
            run.resolved_seed,
        );

        let evicted = self.history.write().await.insert(job.clone());
        if let Some(evicted) = evicted {
            if let Some(token) = self.pollers.lock().await.remove(&evicted.job_id) {
                tracing::debug!(job_id = %evicted.job_id, "Evicted job still polling, cancelling");
                token.cancel();
            }
        }

        let token = self.cancel.child_token();
        self.pollers
            .lock()
            .await
            .insert(job_id.clone(), token.clone());

        let ctx = PollContext {
            engine: Arc::clone(&self.engine),
            history: Arc::clone(&self.history),
            pollers: Arc::clone(&self.pollers),
            config: self.config.clone(),
            view_base: self.view_base.clone(),
        };
        self.tasks.spawn(run_poller(ctx, job_id.clone(), token));

        tracing::info!(
            job_id = %job_id,
            workflow_name,
            resolved_seed = job.resolved_seed,
            "Run submitted",
        );

        Ok(job)
    }

    pub async fn get(&self, job_id: &str) -> Result<Job, CoreError> {
        self.history
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Job", job_id))
    }

    /// Most recent jobs first.
    pub async fn list(&self, limit: usize) -> Vec<Job> {
        self.history.read().await.list(limit)
    }

    /// Stop a job on the engine and cancel its poller.
    ///
    /// A pending execution is removed from the engine queue; a running one
    /// is interrupted. The job is then marked cancelled. If the engine has
    /// already finished the job, its real outcome is recorded instead and
    /// the stop answers with a conflict.
    ///
    /// ComfyUI's interrupt is global: it aborts whatever prompt is running
    /// when it arrives. The queue is re-read right before interrupting, but
    /// a job that finishes between that read and the interrupt still lets
    /// the interrupt land on the next prompt.
    pub async fn stop(&self, job_id: &str) -> Result<Job, CoreError> {
        let job = self.get(job_id).await?;
        if job.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} already finished with status {:?}",
                job.status
            )));
        }

        let queue = self.engine.queue().await?;
        if queue.is_pending(job_id) {
            self.engine.cancel(job_id).await?;
        } else if queue.is_running(job_id) && self.engine.queue().await?.is_running(job_id) {
            self.engine.interrupt().await?;
        } else if let Some(entry) = self.engine.history(job_id).await? {
            return Err(self.settle_finished(job_id, &entry).await);
        } else {
            tracing::debug!(job_id, "Job not in engine queue, stopping locally");
        }

        if let Some(token) = self.pollers.lock().await.remove(job_id) {
            token.cancel();
        }

        let stopped = self
            .history
            .write()
            .await
            .finish(job_id, JobOutcome::cancelled());

        match stopped {
            Some(job) => {
                tracing::info!(job_id, "Job stopped");
                Ok(job)
            }
            None => Err(CoreError::Conflict(format!(
                "Job {job_id} finished before it could be stopped"
            ))),
        }
    }

    /// Record the engine's outcome for a job caught finished during `stop`.
    async fn settle_finished(&self, job_id: &str, entry: &HistoryEntry) -> CoreError {
        if let Some(token) = self.pollers.lock().await.remove(job_id) {
            token.cancel();
        }

        let outcome = outcome_from_history(entry, &self.view_base);
        let status = outcome.status;
        if self.history.write().await.finish(job_id, outcome).is_some() {
            tracing::info!(job_id, ?status, "Job finished before stop");
        }

        CoreError::Conflict(format!(
            "Job {job_id} already finished with status {status:?}"
        ))
    }

    /// Number of pollers that have not exited yet.
    pub async fn active_pollers(&self) -> usize {
        self.pollers.lock().await.len()
    }

    /// Cancel every poller and wait for them to exit.
    ///
    /// Waits up to 5 seconds in total.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down job tracker");
        self.cancel.cancel();
        self.tasks.close();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.tasks.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tasks.len(),
                "Pollers still running after shutdown timeout",
            );
        }

        tracing::info!("Job tracker shut down complete");
    }
}

/// Poll one job to completion, then deregister.
async fn run_poller(ctx: PollContext, job_id: ExecutionId, cancel: CancellationToken) {
    let outcome = poll_until_terminal(&ctx, &job_id, &cancel).await;

    match outcome {
        Some(outcome) if !cancel.is_cancelled() => {
            let status = outcome.status;
            let written = ctx.history.write().await.finish(&job_id, outcome);
            if written.is_some() {
                tracing::info!(job_id = %job_id, ?status, "Job finished");
            } else {
                tracing::debug!(job_id = %job_id, "Job no longer tracked, dropping result");
            }
        }
        _ => tracing::debug!(job_id = %job_id, "Poller cancelled"),
    }

    ctx.pollers.lock().await.remove(&job_id);
}

/// Query the engine with backoff until the job resolves.
///
/// Returns `None` when cancelled.
async fn poll_until_terminal(
    ctx: &PollContext,
    job_id: &str,
    cancel: &CancellationToken,
) -> Option<JobOutcome> {
    let config = &ctx.config;
    let started = Instant::now();
    let mut delay = config.initial_interval;
    let mut attempts = 0u32;
    let mut consecutive_errors = 0u32;

    loop {
        let remaining = config.deadline.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Some(JobOutcome::timed_out(format!(
                "No result within {:?}",
                config.deadline
            )));
        }
        if attempts >= config.max_attempts {
            return Some(JobOutcome::timed_out(format!(
                "No result after {attempts} status checks"
            )));
        }

        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay.min(remaining)) => {}
        }

        attempts += 1;
        let result = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = ctx.engine.history(job_id) => result,
        };

        match result {
            Ok(Some(entry)) => return Some(outcome_from_history(&entry, &ctx.view_base)),
            Ok(None) => {
                consecutive_errors = 0;
                refine_running(ctx, job_id).await;
            }
            Err(e) if e.is_transient() => {
                consecutive_errors += 1;
                tracing::warn!(
                    job_id,
                    attempt = attempts,
                    consecutive_errors,
                    error = %e,
                    "Status check failed",
                );
                if consecutive_errors > config.max_consecutive_errors {
                    return Some(JobOutcome::failed(e.to_string()));
                }
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, "Status check rejected");
                return Some(JobOutcome::failed(e.to_string()));
            }
        }

        delay = next_delay(delay, config);
    }
}

/// Mark the job running once the engine reports it in its running queue.
async fn refine_running(ctx: &PollContext, job_id: &str) {
    match ctx.engine.queue().await {
        Ok(queue) if queue.is_running(job_id) => {
            if ctx.history.write().await.mark_running(job_id) {
                tracing::debug!(job_id, "Job running");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::debug!(job_id, error = %e, "Queue check failed"),
    }
}

fn outcome_from_history(entry: &HistoryEntry, view_base: &str) -> JobOutcome {
    if entry.is_error() {
        return JobOutcome::failed(entry.error_message());
    }
    JobOutcome::completed(entry.first_image().cloned(), view_base)
}
