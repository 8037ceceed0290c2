//! Request dispatcher: forwards profiling requests to node agents and
//! correlates their asynchronous replies with job records.

use crate::agent::{AgentError, ProfilingReply, MAX_DURATION_SECS};
use crate::audit;
use crate::jobs::{JobError, JobOutcome, JobTracker};
use crate::metrics;
use crate::pool::{ConnectionPool, PoolError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};
use vantage_shared::{JobId, JobStatus, NodeId, Pid};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("invalid profiling request: {0}")]
    InvalidRequest(String),
}

pub struct Dispatcher {
    pool: Arc<ConnectionPool>,
    jobs: Arc<JobTracker>,
    inflight: TaskTracker,
}

impl Dispatcher {
    pub fn new(pool: Arc<ConnectionPool>, jobs: Arc<JobTracker>) -> Self {
        Self {
            pool,
            jobs,
            inflight: TaskTracker::new(),
        }
    }

    /// Forward a profiling request to `node_id`'s agent.
    ///
    /// Returns the job identifier without waiting for the agent. The job
    /// record is created before the continuation is spawned, so even a reply
    /// that is ready immediately finds its job. Must be called from within a
    /// tokio runtime.
    pub fn launch(
        &self,
        node_id: &NodeId,
        pid: Pid,
        duration: Duration,
    ) -> Result<JobId, DispatchError> {
        if pid <= 0 {
            return Err(DispatchError::InvalidRequest(format!(
                "pid must be positive, got {}",
                pid
            )));
        }
        if duration < Duration::from_secs(1) || duration.as_secs() > MAX_DURATION_SECS {
            return Err(DispatchError::InvalidRequest(format!(
                "duration must be between 1s and {}s, got {:?}",
                MAX_DURATION_SECS, duration
            )));
        }

        let agent = self.pool.get(node_id)?;
        let job_id = self.jobs.create(node_id.clone(), pid, duration);
        let call = agent.get_profiling_stats(pid, duration);

        let jobs = self.jobs.clone();
        let id = job_id.clone();
        self.inflight.spawn(async move {
            let outcome = interpret_reply(call.await);
            record_completion(&jobs, &id, outcome);
        });

        metrics::JOBS_LAUNCHED.inc();
        audit::profiling_launched(job_id.as_str(), node_id.as_str(), pid, duration.as_secs());
        Ok(job_id)
    }

    pub fn status(&self, job_id: &JobId) -> Result<JobStatus, DispatchError> {
        Ok(self.jobs.status(job_id)?)
    }

    pub fn result(&self, job_id: &JobId) -> Result<Value, DispatchError> {
        Ok(self.jobs.result(job_id)?)
    }

    /// Number of remote calls whose continuation has not run yet.
    pub fn inflight(&self) -> usize {
        self.inflight.len()
    }

    /// Stop accepting continuations and wait up to `grace` for the
    /// outstanding ones. Jobs still waiting afterwards stay pending.
    pub async fn drain(&self, grace: Duration) {
        self.inflight.close();
        if tokio::time::timeout(grace, self.inflight.wait()).await.is_err() {
            warn!(
                "{} profiling job(s) still in flight after {:?}; leaving them pending",
                self.inflight.len(),
                grace
            );
        }
    }
}

/// Map a remote call result onto the job's terminal outcome.
pub fn interpret_reply(reply: Result<ProfilingReply, AgentError>) -> JobOutcome {
    match reply {
        Err(e) => JobOutcome::Error(e.to_string()),
        Ok(reply) if !reply.std_err.is_empty() => JobOutcome::Error(reply.std_err),
        Ok(reply) => match serde_json::from_str(&reply.profiling_stats) {
            Ok(payload) => JobOutcome::Finished(payload),
            Err(e) => JobOutcome::Error(format!("invalid profiling payload: {}", e)),
        },
    }
}

fn record_completion(jobs: &JobTracker, job_id: &JobId, outcome: JobOutcome) {
    match jobs.complete(job_id, outcome) {
        Ok(state) => {
            info!(job_id = %job_id, state = %state, "Profiling job completed");
        }
        Err(e) => {
            audit::completion_violation(job_id.as_str(), &e.to_string());
            panic!("profiling continuation violated the job protocol: {}", e);
        }
    }
    debug!(job_id = %job_id, "Continuation done");
}
