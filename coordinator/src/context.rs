//! The coordinator context: one explicitly constructed object that owns the
//! connection pool, the job tracker, the dispatcher and the reconciliation
//! loop. Created with [`Coordinator::init`] at process start and shut down
//! with [`Coordinator::teardown`].

use crate::agent::AgentConnector;
use crate::dispatcher::Dispatcher;
use crate::introspect::IntrospectRegistry;
use crate::jobs::JobTracker;
use crate::membership::MembershipProvider;
use crate::pool::ConnectionPool;
use crate::reconcile::ReconcileLoop;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runtime knobs for [`Coordinator::init`]
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub reconcile_interval: Duration,
    pub shutdown_grace: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            reconcile_interval: Duration::from_secs(crate::DEFAULT_RECONCILE_INTERVAL_SECS),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::CoordinatorConfig> for CoordinatorSettings {
    fn from(config: &crate::config::CoordinatorConfig) -> Self {
        Self {
            reconcile_interval: config.reconcile_interval(),
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

pub struct Coordinator {
    pool: Arc<ConnectionPool>,
    jobs: Arc<JobTracker>,
    dispatcher: Arc<Dispatcher>,
    introspection: Arc<IntrospectRegistry>,
    shutdown: CancellationToken,
    reconcile_task: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl Coordinator {
    /// Build the context, run a first reconciliation pass and start the
    /// background loop. A failing first pass is logged; the loop retries.
    pub async fn init(
        settings: CoordinatorSettings,
        membership: Arc<dyn MembershipProvider>,
        connector: Arc<dyn AgentConnector>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new(membership.clone(), connector));
        let jobs = Arc::new(JobTracker::new());
        let dispatcher = Arc::new(Dispatcher::new(pool.clone(), jobs.clone()));
        let introspection = Arc::new(
            IntrospectRegistry::new()
                .register("nodes", pool.clone())
                .register("jobs", jobs.clone()),
        );

        let reconciler = ReconcileLoop::new(pool.clone(), membership, settings.reconcile_interval);
        match reconciler.run_once().await {
            Ok(report) => info!(
                nodes = pool.len(),
                skipped = report.skipped.len(),
                "Initial reconciliation complete"
            ),
            Err(e) => warn!("Initial membership fetch failed: {}", e),
        }

        let shutdown = CancellationToken::new();
        let reconcile_task = reconciler.spawn(shutdown.clone());

        Self {
            pool,
            jobs,
            dispatcher,
            introspection,
            shutdown,
            reconcile_task,
            shutdown_grace: settings.shutdown_grace,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.jobs
    }

    pub fn introspection(&self) -> &Arc<IntrospectRegistry> {
        &self.introspection
    }

    /// Token cancelled when teardown starts; servers use it for graceful
    /// shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop the loop, close every agent channel and give in-flight calls
    /// the configured grace period.
    pub async fn teardown(self) {
        info!("Tearing down coordinator");
        self.shutdown.cancel();
        if let Err(e) = self.reconcile_task.await {
            warn!("Reconciliation task ended abnormally: {}", e);
        }
        self.pool.close_all();
        self.dispatcher.drain(self.shutdown_grace).await;
        info!(jobs = self.jobs.len(), "Coordinator stopped");
    }
}
