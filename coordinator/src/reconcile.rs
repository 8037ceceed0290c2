//! Reconciliation loop: keeps the connection pool in step with membership.

use crate::membership::{MembershipError, MembershipProvider};
use crate::metrics;
use crate::pool::{ConnectionPool, ReconcileReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ReconcileLoop {
    pool: Arc<ConnectionPool>,
    membership: Arc<dyn MembershipProvider>,
    interval: Duration,
}

impl ReconcileLoop {
    pub fn new(
        pool: Arc<ConnectionPool>,
        membership: Arc<dyn MembershipProvider>,
        interval: Duration,
    ) -> Self {
        Self {
            pool,
            membership,
            interval,
        }
    }

    /// Fetch one membership snapshot and reconcile the pool against it.
    pub async fn run_once(&self) -> Result<ReconcileReport, MembershipError> {
        let timer = metrics::RECONCILE_DURATION.start_timer();
        let snapshot = match self.membership.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                metrics::RECONCILE_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        };
        let report = self.pool.reconcile(&snapshot).await;
        timer.observe_duration();
        metrics::RECONCILE_TOTAL.with_label_values(&["ok"]).inc();
        Ok(report)
    }

    /// Sleep, reconcile, repeat until `shutdown` is cancelled. A failed
    /// membership fetch is logged and retried after the same interval.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_secs = self.interval.as_secs_f64(), "Starting reconciliation loop");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            match self.run_once().await {
                Ok(report) if report.is_noop() => {
                    debug!(nodes = self.pool.len(), "Membership unchanged");
                }
                Ok(report) => {
                    info!(
                        added = report.added.len(),
                        removed = report.removed.len(),
                        skipped = report.skipped.len(),
                        nodes = self.pool.len(),
                        "Reconciled agent connections"
                    );
                }
                Err(e) => {
                    warn!(
                        "Membership fetch failed, retrying in {:?}: {}",
                        self.interval, e
                    );
                }
            }
        }
        info!("Reconciliation loop stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fakes::FakeConnector;
    use crate::membership::InMemoryMembership;
    use vantage_shared::{NodeId, NodeRecord};

    fn setup() -> (Arc<InMemoryMembership>, Arc<ConnectionPool>) {
        let membership = Arc::new(InMemoryMembership::new());
        let pool = Arc::new(ConnectionPool::new(
            membership.clone(),
            Arc::new(FakeConnector::default()),
        ));
        (membership, pool)
    }

    #[tokio::test]
    async fn run_once_applies_snapshot() {
        let (membership, pool) = setup();
        membership.set_nodes(vec![NodeRecord::new("a", "10.0.0.1")]);
        membership.publish_port("10.0.0.1", 1);

        let reconciler = ReconcileLoop::new(pool.clone(), membership, Duration::from_secs(10));
        let report = reconciler.run_once().await.unwrap();
        assert_eq!(report.added, vec![NodeId::new("a")]);
        assert!(pool.contains(&NodeId::new("a")));
    }

    #[tokio::test]
    async fn run_once_surfaces_membership_failure() {
        let (membership, pool) = setup();
        membership.set_unavailable(Some("registry down".to_string()));
        let reconciler = ReconcileLoop::new(pool, membership, Duration::from_secs(10));
        assert!(matches!(
            reconciler.run_once().await,
            Err(MembershipError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn loop_survives_failed_fetches() {
        let (membership, pool) = setup();
        membership.set_unavailable(Some("registry down".to_string()));
        membership.set_nodes(vec![NodeRecord::new("a", "10.0.0.1")]);
        membership.publish_port("10.0.0.1", 1);

        let shutdown = CancellationToken::new();
        let handle = ReconcileLoop::new(pool.clone(), membership.clone(), Duration::from_secs(10))
            .spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert!(pool.is_empty());
        assert!(!handle.is_finished());

        membership.set_unavailable(None);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(pool.contains(&NodeId::new("a")));

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn loop_tracks_membership_changes() {
        let (membership, pool) = setup();
        membership.set_nodes(vec![
            NodeRecord::new("a", "10.0.0.1"),
            NodeRecord::new("b", "10.0.0.2"),
        ]);
        membership.publish_port("10.0.0.1", 1);
        membership.publish_port("10.0.0.2", 2);

        let shutdown = CancellationToken::new();
        let handle = ReconcileLoop::new(pool.clone(), membership.clone(), Duration::from_secs(10))
            .spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(pool.len(), 2);

        membership.set_nodes(vec![NodeRecord::new("a", "10.0.0.1")]);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!pool.contains(&NodeId::new("b")));

        shutdown.cancel();
        handle.await.unwrap();
    }
}
