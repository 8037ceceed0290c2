use super::{MembershipError, MembershipProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use vantage_shared::NodeRecord;

#[derive(Debug, Default)]
struct MembershipState {
    nodes: Vec<NodeRecord>,
    agent_ports: HashMap<String, u16>,
    unavailable: Option<String>,
}

/// Membership held in memory and changed through method calls. Thread-safe.
///
/// Useful for embedding the coordinator and for driving churn in tests.
#[derive(Debug, Default)]
pub struct InMemoryMembership {
    state: RwLock<MembershipState>,
}

impl InMemoryMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the node set.
    pub fn set_nodes(&self, nodes: Vec<NodeRecord>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).nodes = nodes;
    }

    /// Publish the agent port for `address`.
    pub fn publish_port(&self, address: impl Into<String>, port: u16) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .agent_ports
            .insert(address.into(), port);
    }

    pub fn withdraw_port(&self, address: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .agent_ports
            .remove(address);
    }

    /// Make `list_nodes` fail with `reason` until cleared with `None`.
    pub fn set_unavailable(&self, reason: Option<String>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).unavailable = reason;
    }
}

#[async_trait]
impl MembershipProvider for InMemoryMembership {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, MembershipError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        match &state.unavailable {
            Some(reason) => Err(MembershipError::Unavailable(reason.clone())),
            None => Ok(state.nodes.clone()),
        }
    }

    async fn resolve_agent_port(&self, address: &str) -> Result<Option<u16>, MembershipError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state.agent_ports.get(address).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ports_can_be_published_and_withdrawn() {
        let membership = InMemoryMembership::new();
        membership.set_nodes(vec![NodeRecord::new("a", "10.0.0.1")]);
        assert_eq!(membership.resolve_agent_port("10.0.0.1").await.unwrap(), None);

        membership.publish_port("10.0.0.1", 52365);
        assert_eq!(
            membership.resolve_agent_port("10.0.0.1").await.unwrap(),
            Some(52365)
        );

        membership.withdraw_port("10.0.0.1");
        assert_eq!(membership.resolve_agent_port("10.0.0.1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn unavailable_source_fails_listing() {
        let membership = InMemoryMembership::new();
        membership.set_unavailable(Some("gcs down".to_string()));
        assert!(matches!(
            membership.list_nodes().await,
            Err(MembershipError::Unavailable(_))
        ));
        membership.set_unavailable(None);
        assert!(membership.list_nodes().await.unwrap().is_empty());
    }
}
