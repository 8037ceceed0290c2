//! Remote-call channels to per-node reporter agents.
//!
//! [`AgentConnector`] establishes a channel for a node's agent endpoint and
//! [`AgentClient`] issues `GetProfilingStats` over it. The gRPC
//! implementations are generated from `proto/reporter.proto`.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tonic::codec::CompressionEncoding;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;
use vantage_shared::{NodeId, Pid};

pub mod proto {
    tonic::include_proto!("vantage.reporter.v1");
}

use proto::reporter_service_client::ReporterServiceClient;
use proto::{GetProfilingStatsReply, GetProfilingStatsRequest};

/// Reply of a `GetProfilingStats` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilingReply {
    /// JSON document produced by the agent
    pub profiling_stats: String,
    pub std_out: String,
    /// Non-empty when the agent failed to profile the process
    pub std_err: String,
}

impl ProfilingReply {
    pub fn success(profiling_stats: impl Into<String>) -> Self {
        Self {
            profiling_stats: profiling_stats.into(),
            ..Default::default()
        }
    }

    pub fn failure(std_err: impl Into<String>) -> Self {
        Self {
            std_err: std_err.into(),
            ..Default::default()
        }
    }
}

impl From<GetProfilingStatsReply> for ProfilingReply {
    fn from(reply: GetProfilingStatsReply) -> Self {
        Self {
            profiling_stats: reply.profiling_stats,
            std_out: reply.std_out,
            std_err: reply.std_err,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid agent endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("agent call failed: {0}")]
    Rpc(#[from] Status),

    #[error("agent channel closed")]
    Closed,

    #[error("duration of {0}s exceeds the agent limit of {max}s", max = MAX_DURATION_SECS)]
    DurationOutOfRange(u64),
}

/// Longest duration the reporter protocol can carry (an `int32` of seconds).
pub const MAX_DURATION_SECS: u64 = i32::MAX as u64;

/// An issued remote call. Owns everything it needs, so it outlives the
/// borrow of the client that produced it.
pub type AgentCall = Pin<Box<dyn Future<Output = Result<ProfilingReply, AgentError>> + Send>>;

/// An established channel to one node's agent.
pub trait AgentClient: Send + Sync {
    /// Issue `GetProfilingStats(pid, duration)`.
    fn get_profiling_stats(&self, pid: Pid, duration: Duration) -> AgentCall;

    /// Close the channel. Calls issued afterwards fail with
    /// [`AgentError::Closed`]; calls already issued run to completion.
    fn close(&self);
}

/// Establishes channels to agent endpoints (`host:port`).
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(
        &self,
        node_id: &NodeId,
        endpoint: &str,
    ) -> Result<Arc<dyn AgentClient>, AgentError>;
}

/// Attaches `authorization: Bearer <token>` to every outgoing request when a
/// token is configured.
#[derive(Clone, Default)]
pub struct BearerToken(Option<MetadataValue<Ascii>>);

impl BearerToken {
    pub fn new(token: Option<&str>) -> Result<Self, AgentError> {
        let value = token
            .map(|t| {
                format!("Bearer {}", t)
                    .parse::<MetadataValue<Ascii>>()
                    .map_err(|e| AgentError::InvalidEndpoint {
                        endpoint: "<auth token>".to_string(),
                        reason: e.to_string(),
                    })
            })
            .transpose()?;
        Ok(Self(value))
    }
}

impl Interceptor for BearerToken {
    fn call(&mut self, mut req: Request<()>) -> Result<Request<()>, Status> {
        if let Some(value) = &self.0 {
            req.metadata_mut().insert("authorization", value.clone());
        }
        Ok(req)
    }
}

type ReporterClient = ReporterServiceClient<InterceptedService<Channel, BearerToken>>;

/// gRPC channel to a reporter agent.
pub struct GrpcAgentClient {
    client: ReporterClient,
    closed: AtomicBool,
}

impl AgentClient for GrpcAgentClient {
    fn get_profiling_stats(&self, pid: Pid, duration: Duration) -> AgentCall {
        if self.closed.load(Ordering::Acquire) {
            return Box::pin(async { Err(AgentError::Closed) });
        }

        let secs = duration.as_secs();
        let Ok(duration) = i32::try_from(secs) else {
            return Box::pin(async move { Err(AgentError::DurationOutOfRange(secs)) });
        };

        let mut client = self.client.clone();
        let request = GetProfilingStatsRequest { pid, duration };
        Box::pin(async move {
            let reply = client.get_profiling_stats(Request::new(request)).await?;
            Ok(reply.into_inner().into())
        })
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Opens lazy gRPC channels: the TCP connection is dialled on first use, so
/// connecting never blocks a reconciliation pass on an unreachable node.
#[derive(Clone)]
pub struct GrpcConnector {
    connect_timeout: Duration,
    token: BearerToken,
}

impl GrpcConnector {
    pub fn new(connect_timeout: Duration, auth_token: Option<&str>) -> Result<Self, AgentError> {
        Ok(Self {
            connect_timeout,
            token: BearerToken::new(auth_token)?,
        })
    }
}

#[async_trait]
impl AgentConnector for GrpcConnector {
    async fn connect(
        &self,
        node_id: &NodeId,
        endpoint: &str,
    ) -> Result<Arc<dyn AgentClient>, AgentError> {
        let uri = format!("http://{}", endpoint);
        let channel = Channel::from_shared(uri)
            .map_err(|e| AgentError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?
            .connect_timeout(self.connect_timeout)
            .connect_lazy();

        debug!(node_id = %node_id, endpoint = %endpoint, "Opened agent channel");

        let client = ReporterServiceClient::with_interceptor(channel, self.token.clone())
            .accept_compressed(CompressionEncoding::Gzip);
        Ok(Arc::new(GrpcAgentClient {
            client,
            closed: AtomicBool::new(false),
        }))
    }
}
