//! Submitted jobs and the bounded, recency-ordered job history.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::run::Overrides;
use crate::types::{ExecutionId, Timestamp};

/// Default number of jobs retained in history.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Default page size when listing history.
pub const DEFAULT_LIST_LIMIT: usize = 20;

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the engine, not yet seen running.
    Queued,
    /// Reported in the engine's running queue.
    Running,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

// ---------------------------------------------------------------------------
// Artifacts
// ---------------------------------------------------------------------------

/// Reference to one output file held by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub filename: String,
    #[serde(default)]
    pub subfolder: String,
    /// Engine storage area (`output`, `temp`, `input`).
    #[serde(rename = "type", default = "default_artifact_kind")]
    pub kind: String,
}

fn default_artifact_kind() -> String {
    "output".to_string()
}

impl ArtifactRef {
    /// Build a view URL for this artifact under `base` (e.g.
    /// `/api/v1/engine/view`), with URL-encoded query parameters.
    pub fn view_url(&self, base: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("filename", &self.filename)
            .append_pair("subfolder", &self.subfolder)
            .append_pair("type", &self.kind)
            .finish();
        format!("{base}?{query}")
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// A submitted run, identified by the engine's execution id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: ExecutionId,
    pub workflow_name: String,
    pub status: JobStatus,
    /// Overrides applied to the submitted graph.
    pub resolved_inputs: Overrides,
    pub resolved_seed: u64,
    pub artifact: Option<ArtifactRef>,
    /// Service-relative URL for `artifact`.
    pub image_url: Option<String>,
    /// Failure or timeout reason for unsuccessful terminal states.
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// A freshly submitted job in [`JobStatus::Queued`].
    pub fn queued(
        job_id: ExecutionId,
        workflow_name: String,
        resolved_inputs: Overrides,
        resolved_seed: u64,
    ) -> Self {
        Self {
            job_id,
            workflow_name,
            status: JobStatus::Queued,
            resolved_inputs,
            resolved_seed,
            artifact: None,
            image_url: None,
            error: None,
            created_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

/// Everything written when a job reaches a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub status: JobStatus,
    pub artifact: Option<ArtifactRef>,
    pub image_url: Option<String>,
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn completed(artifact: Option<ArtifactRef>, view_base: &str) -> Self {
        let image_url = artifact.as_ref().map(|a| a.view_url(view_base));
        Self {
            status: JobStatus::Completed,
            artifact,
            image_url,
            error: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::unsuccessful(JobStatus::Failed, reason)
    }

    pub fn timed_out(reason: impl Into<String>) -> Self {
        Self::unsuccessful(JobStatus::TimedOut, reason)
    }

    pub fn cancelled() -> Self {
        Self {
            status: JobStatus::Cancelled,
            artifact: None,
            image_url: None,
            error: None,
        }
    }

    fn unsuccessful(status: JobStatus, reason: impl Into<String>) -> Self {
        Self {
            status,
            artifact: None,
            image_url: None,
            error: Some(reason.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Fixed-capacity job store, most recent first, with id lookup.
///
/// The order and the index are only ever changed together, so an evicted
/// job disappears from both at once.
#[derive(Debug)]
pub struct JobHistory {
    capacity: usize,
    order: VecDeque<ExecutionId>,
    jobs: HashMap<ExecutionId, Job>,
}

impl Default for JobHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl JobHistory {
    /// Create an empty history. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity + 1),
            jobs: HashMap::with_capacity(capacity + 1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a job at the front, evicting the oldest beyond capacity.
    ///
    /// Returns the evicted job, if any. Re-inserting an existing id replaces
    /// the record and moves it to the front.
    pub fn insert(&mut self, job: Job) -> Option<Job> {
        if self.jobs.contains_key(&job.job_id) {
            self.order.retain(|id| id != &job.job_id);
        }
        self.order.push_front(job.job_id.clone());
        self.jobs.insert(job.job_id.clone(), job);

        if self.order.len() > self.capacity {
            let evicted_id = self.order.pop_back()?;
            return self.jobs.remove(&evicted_id);
        }
        None
    }

    pub fn get(&self, job_id: &str) -> Option<&Job> {
        self.jobs.get(job_id)
    }

    /// Most-recent-first, at most `limit` jobs.
    pub fn list(&self, limit: usize) -> Vec<Job> {
        self.order
            .iter()
            .take(limit)
            .filter_map(|id| self.jobs.get(id).cloned())
            .collect()
    }

    /// Move a queued job to running. Returns `false` if the job is gone or
    /// not queued.
    pub fn mark_running(&mut self, job_id: &str) -> bool {
        match self.jobs.get_mut(job_id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Running;
                true
            }
            _ => false,
        }
    }

    /// Apply a terminal outcome in a single write.
    ///
    /// Returns the updated job, or `None` if the job was evicted or is
    /// already terminal.
    pub fn finish(&mut self, job_id: &str, outcome: JobOutcome) -> Option<Job> {
        let job = self.jobs.get_mut(job_id)?;
        if job.status.is_terminal() {
            return None;
        }
        job.status = outcome.status;
        job.artifact = outcome.artifact;
        job.image_url = outcome.image_url;
        job.error = outcome.error;
        job.finished_at = Some(chrono::Utc::now());
        Some(job.clone())
    }
}
