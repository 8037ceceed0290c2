//! Profiling job tracker.
//!
//! Jobs are created once per launch and completed once by the continuation
//! of their remote call. Completed jobs are kept for the lifetime of the
//! process.

use crate::metrics;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use vantage_shared::{JobId, JobState, JobStatus, JobSummary, NodeId, Pid};

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("unknown profiling job: {0}")]
    UnknownJob(JobId),

    /// A continuation fired twice for the same job.
    #[error("profiling job {0} already completed")]
    AlreadyCompleted(JobId),

    #[error("profiling not finished")]
    NotFinished(JobId),

    #[error("profiling job {job_id} failed: {error}")]
    Failed { job_id: JobId, error: String },
}

/// Terminal result of a job
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Parsed agent payload
    Finished(Value),
    Error(String),
}

impl JobOutcome {
    pub fn state(&self) -> JobState {
        match self {
            JobOutcome::Finished(_) => JobState::Finished,
            JobOutcome::Error(_) => JobState::Error,
        }
    }
}

#[derive(Debug, Clone)]
struct ProfilingJob {
    node_id: NodeId,
    pid: Pid,
    duration: Duration,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    /// `None` while pending
    outcome: Option<JobOutcome>,
}

impl ProfilingJob {
    fn state(&self) -> JobState {
        self.outcome
            .as_ref()
            .map(JobOutcome::state)
            .unwrap_or(JobState::Pending)
    }
}

/// Job table. Thread-safe; locks are never held across an await.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: RwLock<HashMap<JobId, ProfilingJob>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_jobs(&self) -> RwLockReadGuard<'_, HashMap<JobId, ProfilingJob>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_jobs(&self) -> RwLockWriteGuard<'_, HashMap<JobId, ProfilingJob>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new pending job and return its fresh identifier.
    pub fn create(&self, node_id: NodeId, pid: Pid, duration: Duration) -> JobId {
        let mut jobs = self.write_jobs();
        let job_id = loop {
            let id = JobId::generate();
            if !jobs.contains_key(&id) {
                break id;
            }
        };
        jobs.insert(
            job_id.clone(),
            ProfilingJob {
                node_id,
                pid,
                duration,
                created_at: Utc::now(),
                completed_at: None,
                outcome: None,
            },
        );
        metrics::JOBS_TRACKED.set(jobs.len() as f64);
        job_id
    }

    /// Record the terminal outcome of `job_id`. Fails if the job is unknown
    /// or already terminal; the stored outcome is never overwritten.
    pub fn complete(&self, job_id: &JobId, outcome: JobOutcome) -> Result<JobState, JobError> {
        let mut jobs = self.write_jobs();
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        if job.outcome.is_some() {
            return Err(JobError::AlreadyCompleted(job_id.clone()));
        }

        let state = outcome.state();
        job.outcome = Some(outcome);
        job.completed_at = Some(Utc::now());
        metrics::JOBS_COMPLETED
            .with_label_values(&[&state.to_string()])
            .inc();
        Ok(state)
    }

    pub fn status(&self, job_id: &JobId) -> Result<JobStatus, JobError> {
        let jobs = self.read_jobs();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        Ok(match &job.outcome {
            None => JobStatus::Pending,
            Some(JobOutcome::Finished(_)) => JobStatus::Finished,
            Some(JobOutcome::Error(error)) => JobStatus::Error {
                error: error.clone(),
            },
        })
    }

    /// Payload of a finished job. Asking for it before the job finished, or
    /// for an errored job, is a caller error.
    pub fn result(&self, job_id: &JobId) -> Result<Value, JobError> {
        let jobs = self.read_jobs();
        let job = jobs
            .get(job_id)
            .ok_or_else(|| JobError::UnknownJob(job_id.clone()))?;
        match &job.outcome {
            None => Err(JobError::NotFinished(job_id.clone())),
            Some(JobOutcome::Finished(payload)) => Ok(payload.clone()),
            Some(JobOutcome::Error(error)) => Err(JobError::Failed {
                job_id: job_id.clone(),
                error: error.clone(),
            }),
        }
    }

    /// Every tracked job, oldest first.
    pub fn summaries(&self) -> Vec<JobSummary> {
        let mut out: Vec<JobSummary> = self
            .read_jobs()
            .iter()
            .map(|(job_id, job)| JobSummary {
                job_id: job_id.clone(),
                node_id: job.node_id.clone(),
                pid: job.pid,
                duration_secs: job.duration.as_secs(),
                state: job.state(),
                created_at: job.created_at,
                completed_at: job.completed_at,
                error: match &job.outcome {
                    Some(JobOutcome::Error(e)) => Some(e.clone()),
                    _ => None,
                },
            })
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }

    pub fn len(&self) -> usize {
        self.read_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
