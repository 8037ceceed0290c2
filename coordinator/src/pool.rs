//! Connection pool: one agent channel per live node.
//!
//! The pool is the only owner of agent channels. Entries are created and
//! destroyed exclusively by [`ConnectionPool::reconcile`]; everything else
//! only reads.

use crate::agent::{AgentClient, AgentConnector};
use crate::membership::MembershipProvider;
use crate::metrics;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use vantage_shared::utils::agent_endpoint;
use vantage_shared::{NodeConnection, NodeId, NodeRecord};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The node is not in the cluster, or its agent has not published a
    /// port yet.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),
}

/// An established channel to one node's agent
#[derive(Clone)]
pub struct ConnectionEntry {
    pub node_id: NodeId,
    pub endpoint: String,
    pub client: Arc<dyn AgentClient>,
    pub connected_at: DateTime<Utc>,
}

/// What a reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
    /// Nodes in the snapshot that still have no entry (no port published,
    /// lookup failed, or the channel could not be opened)
    pub skipped: Vec<NodeId>,
}

impl ReconcileReport {
    /// True when the pass left the pool untouched.
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct ConnectionPool {
    membership: Arc<dyn MembershipProvider>,
    connector: Arc<dyn AgentConnector>,
    entries: RwLock<HashMap<NodeId, ConnectionEntry>>,
    /// Serializes reconciliation passes; held across the port lookups.
    reconcile_lock: tokio::sync::Mutex<()>,
    last_reconciled: RwLock<Option<DateTime<Utc>>>,
}

impl ConnectionPool {
    pub fn new(
        membership: Arc<dyn MembershipProvider>,
        connector: Arc<dyn AgentConnector>,
    ) -> Self {
        Self {
            membership,
            connector,
            entries: RwLock::new(HashMap::new()),
            reconcile_lock: tokio::sync::Mutex::new(()),
            last_reconciled: RwLock::new(None),
        }
    }

    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<NodeId, ConnectionEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<NodeId, ConnectionEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the pool match `snapshot`.
    ///
    /// Entries for nodes missing from the snapshot are closed and removed.
    /// Nodes without an entry get one if their agent port resolves; nodes
    /// whose port does not resolve are skipped and retried on the next pass.
    /// An unchanged snapshot leaves the pool untouched.
    pub async fn reconcile(&self, snapshot: &[NodeRecord]) -> ReconcileReport {
        let _pass = self.reconcile_lock.lock().await;
        let mut report = ReconcileReport::default();
        let live: HashSet<&NodeId> = snapshot.iter().map(|n| &n.node_id).collect();

        let departed: Vec<ConnectionEntry> = {
            let mut entries = self.write_entries();
            let gone: Vec<NodeId> = entries
                .keys()
                .filter(|id| !live.contains(id))
                .cloned()
                .collect();
            gone.iter().filter_map(|id| entries.remove(id)).collect()
        };
        for entry in departed {
            entry.client.close();
            info!(node_id = %entry.node_id, endpoint = %entry.endpoint, "Node left; closed agent channel");
            report.removed.push(entry.node_id);
        }

        let mut seen = HashSet::new();
        for node in snapshot {
            if !seen.insert(&node.node_id) || self.contains(&node.node_id) {
                continue;
            }

            let port = match self.membership.resolve_agent_port(&node.address).await {
                Ok(Some(port)) => port,
                Ok(None) => {
                    debug!(node_id = %node.node_id, address = %node.address, "No agent port published yet");
                    report.skipped.push(node.node_id.clone());
                    continue;
                }
                Err(e) => {
                    debug!(node_id = %node.node_id, "Agent port lookup failed: {}", e);
                    report.skipped.push(node.node_id.clone());
                    continue;
                }
            };

            let endpoint = agent_endpoint(&node.address, port);
            match self.connector.connect(&node.node_id, &endpoint).await {
                Ok(client) => {
                    info!(node_id = %node.node_id, endpoint = %endpoint, "Connected to node agent");
                    self.write_entries().insert(
                        node.node_id.clone(),
                        ConnectionEntry {
                            node_id: node.node_id.clone(),
                            endpoint,
                            client,
                            connected_at: Utc::now(),
                        },
                    );
                    report.added.push(node.node_id.clone());
                }
                Err(e) => {
                    warn!(node_id = %node.node_id, endpoint = %endpoint, "Failed to open agent channel: {}", e);
                    report.skipped.push(node.node_id.clone());
                }
            }
        }

        metrics::POOL_CONNECTIONS.set(self.len() as f64);
        *self
            .last_reconciled
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        report
    }

    /// Channel for `node_id`, or [`PoolError::UnknownNode`].
    pub fn get(&self, node_id: &NodeId) -> Result<Arc<dyn AgentClient>, PoolError> {
        self.read_entries()
            .get(node_id)
            .map(|entry| entry.client.clone())
            .ok_or_else(|| PoolError::UnknownNode(node_id.clone()))
    }

    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.read_entries().contains_key(node_id)
    }

    pub fn node_ids(&self) -> BTreeSet<NodeId> {
        self.read_entries().keys().cloned().collect()
    }

    /// Read-only view of every entry, sorted by node id.
    pub fn connections(&self) -> Vec<NodeConnection> {
        let mut out: Vec<NodeConnection> = self
            .read_entries()
            .values()
            .map(|entry| NodeConnection {
                node_id: entry.node_id.clone(),
                endpoint: entry.endpoint.clone(),
                connected_at: entry.connected_at.to_rfc3339(),
            })
            .collect();
        out.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        out
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// When the last reconciliation pass finished, if any.
    pub fn last_reconciled(&self) -> Option<DateTime<Utc>> {
        *self
            .last_reconciled
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Close and drop every channel.
    pub fn close_all(&self) {
        let drained: Vec<ConnectionEntry> = self.write_entries().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.client.close();
        }
        metrics::POOL_CONNECTIONS.set(0.0);
        if !drained.is_empty() {
            info!("Closed {} agent channel(s)", drained.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::fakes::FakeConnector;
    use crate::membership::InMemoryMembership;
    use std::sync::atomic::Ordering;

    fn ids(names: &[&str]) -> BTreeSet<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    fn setup() -> (Arc<InMemoryMembership>, Arc<FakeConnector>, ConnectionPool) {
        let membership = Arc::new(InMemoryMembership::new());
        let connector = Arc::new(FakeConnector::default());
        let pool = ConnectionPool::new(membership.clone(), connector.clone());
        (membership, connector, pool)
    }

    #[tokio::test]
    async fn adds_only_resolvable_nodes() {
        let (membership, _, pool) = setup();
        membership.publish_port("10.0.0.1", 52365);
        let snapshot = vec![
            NodeRecord::new("a", "10.0.0.1"),
            NodeRecord::new("b", "10.0.0.2"),
        ];

        let report = pool.reconcile(&snapshot).await;
        assert_eq!(report.added, vec![NodeId::new("a")]);
        assert_eq!(report.skipped, vec![NodeId::new("b")]);
        assert_eq!(pool.node_ids(), ids(&["a"]));
        assert!(matches!(
            pool.get(&NodeId::new("b")),
            Err(PoolError::UnknownNode(_))
        ));

        // b publishes its port later and is picked up on the next pass
        membership.publish_port("10.0.0.2", 52365);
        let report = pool.reconcile(&snapshot).await;
        assert_eq!(report.added, vec![NodeId::new("b")]);
        assert_eq!(pool.node_ids(), ids(&["a", "b"]));
    }

    #[tokio::test]
    async fn unchanged_snapshot_is_a_noop() {
        let (membership, connector, pool) = setup();
        membership.publish_port("10.0.0.1", 1);
        membership.publish_port("10.0.0.2", 2);
        let snapshot = vec![
            NodeRecord::new("a", "10.0.0.1"),
            NodeRecord::new("b", "10.0.0.2"),
        ];

        pool.reconcile(&snapshot).await;
        let first = pool.node_ids();
        let channel_a = connector.agent("10.0.0.1:1").unwrap();

        let report = pool.reconcile(&snapshot).await;
        assert!(report.is_noop());
        assert_eq!(pool.node_ids(), first);
        // The existing channel was kept, not replaced
        assert!(Arc::ptr_eq(&connector.agent("10.0.0.1:1").unwrap(), &channel_a));
        assert!(!channel_a.closed.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn removes_and_closes_departed_nodes() {
        let (membership, connector, pool) = setup();
        membership.publish_port("10.0.0.1", 1);
        membership.publish_port("10.0.0.2", 2);
        pool.reconcile(&[
            NodeRecord::new("a", "10.0.0.1"),
            NodeRecord::new("b", "10.0.0.2"),
        ])
        .await;

        let report = pool.reconcile(&[NodeRecord::new("a", "10.0.0.1")]).await;
        assert_eq!(report.removed, vec![NodeId::new("b")]);
        assert_eq!(pool.node_ids(), ids(&["a"]));
        assert!(connector
            .agent("10.0.0.2:2")
            .unwrap()
            .closed
            .load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn duplicate_ids_in_snapshot_yield_one_entry() {
        let (membership, _, pool) = setup();
        membership.publish_port("10.0.0.1", 1);
        membership.publish_port("10.0.0.9", 9);
        let report = pool
            .reconcile(&[
                NodeRecord::new("a", "10.0.0.1"),
                NodeRecord::new("a", "10.0.0.9"),
            ])
            .await;
        assert_eq!(report.added.len(), 1);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.connections()[0].endpoint, "10.0.0.1:1");
    }

    #[tokio::test]
    async fn empty_snapshot_drains_pool() {
        let (membership, _, pool) = setup();
        membership.publish_port("10.0.0.1", 1);
        pool.reconcile(&[NodeRecord::new("a", "10.0.0.1")]).await;
        assert!(pool.last_reconciled().is_some());

        pool.reconcile(&[]).await;
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn close_all_closes_every_channel() {
        let (membership, connector, pool) = setup();
        membership.publish_port("10.0.0.1", 1);
        pool.reconcile(&[NodeRecord::new("a", "10.0.0.1")]).await;

        pool.close_all();
        assert!(pool.is_empty());
        assert!(connector
            .agent("10.0.0.1:1")
            .unwrap()
            .closed
            .load(Ordering::Acquire));
    }
}
