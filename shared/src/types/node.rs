//! Cluster node identity types
//!
//! Nodes are reported by the membership source; the coordinator never
//! creates them, it only tracks which ones currently exist.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, stable identifier of a worker node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A node as reported by the membership source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node identifier
    pub node_id: NodeId,

    /// Network address (IP or hostname) the node's agent listens on
    pub address: String,
}

impl NodeRecord {
    pub fn new(node_id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            address: address.into(),
        }
    }
}

/// Read-only view of a live agent connection, as reported by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConnection {
    pub node_id: NodeId,

    /// `address:port` of the node's agent
    pub endpoint: String,

    /// RFC 3339 timestamp of when the channel was established
    pub connected_at: String,
}
