//! Test agents shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use vantage_coordinator::agent::{
    AgentCall, AgentClient, AgentConnector, AgentError, ProfilingReply,
};
use vantage_coordinator::Coordinator;
use vantage_shared::{JobId, JobStatus, NodeId, Pid};

/// Agent whose replies are released by the test, oldest call first.
#[derive(Default)]
pub struct ManualAgent {
    calls: Mutex<Vec<(Pid, Duration, oneshot::Sender<Result<ProfilingReply, AgentError>>)>>,
}

impl ManualAgent {
    pub fn reply(&self, reply: ProfilingReply) {
        let (_, _, tx) = self.calls.lock().unwrap().remove(0);
        let _ = tx.send(Ok(reply));
    }

    pub fn outstanding(&self) -> Vec<(Pid, Duration)> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(pid, duration, _)| (*pid, *duration))
            .collect()
    }
}

impl AgentClient for ManualAgent {
    fn get_profiling_stats(&self, pid: Pid, duration: Duration) -> AgentCall {
        let (tx, rx) = oneshot::channel();
        self.calls.lock().unwrap().push((pid, duration, tx));
        Box::pin(async move { rx.await.unwrap_or(Err(AgentError::Closed)) })
    }

    fn close(&self) {}
}

/// Hands out one `ManualAgent` per endpoint and remembers them.
#[derive(Default)]
pub struct ManualConnector {
    agents: Mutex<HashMap<String, Arc<ManualAgent>>>,
}

impl ManualConnector {
    pub fn agent(&self, endpoint: &str) -> Arc<ManualAgent> {
        self.agents
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .unwrap_or_else(|| panic!("no channel opened to {}", endpoint))
    }
}

#[async_trait]
impl AgentConnector for ManualConnector {
    async fn connect(
        &self,
        _node_id: &NodeId,
        endpoint: &str,
    ) -> Result<Arc<dyn AgentClient>, AgentError> {
        let agent = Arc::new(ManualAgent::default());
        self.agents
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), agent.clone());
        Ok(agent)
    }
}

/// Poll until `job_id` leaves the pending state.
pub async fn wait_terminal(coordinator: &Coordinator, job_id: &JobId) -> JobStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = coordinator.dispatcher().status(job_id).unwrap();
            if status != JobStatus::Pending {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not complete in time")
}
