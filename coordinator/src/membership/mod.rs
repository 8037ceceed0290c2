//! Membership sources: which nodes exist and where their agents listen.
//!
//! The coordinator only consumes membership. Two providers ship with it:
//! [`FileMembership`], which re-reads a JSON document on every query, and
//! [`InMemoryMembership`], which is mutated programmatically.

mod file;
mod memory;

pub use file::{FileMembership, MembershipDocument};
pub use memory::InMemoryMembership;

use async_trait::async_trait;
use std::path::PathBuf;
use vantage_shared::NodeRecord;

#[derive(Debug, thiserror::Error)]
pub enum MembershipError {
    #[error("failed to read membership file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid membership document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("membership source unavailable: {0}")]
    Unavailable(String),
}

/// Source of cluster membership snapshots and agent port lookups.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// Current set of nodes.
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, MembershipError>;

    /// Port the agent on `address` published, or `None` if it has not
    /// published one yet.
    async fn resolve_agent_port(&self, address: &str) -> Result<Option<u16>, MembershipError>;
}
