use super::{MembershipError, MembershipProvider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use vantage_shared::NodeRecord;

/// On-disk membership document.
///
/// ```json
/// {
///   "nodes": [{"node_id": "a1b2", "address": "10.0.0.1"}],
///   "agent_ports": {"10.0.0.1": 52365}
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,

    /// Agent port published per node address
    #[serde(default)]
    pub agent_ports: HashMap<String, u16>,
}

/// Membership backed by a JSON file that is re-read on every query, so
/// editing the file changes the cluster as seen by the next reconciliation.
#[derive(Debug, Clone)]
pub struct FileMembership {
    path: PathBuf,
}

impl FileMembership {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<MembershipDocument, MembershipError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| MembershipError::Io {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| MembershipError::Parse {
            path: self.path.clone(),
            source,
        })
    }
}

#[async_trait]
impl MembershipProvider for FileMembership {
    async fn list_nodes(&self) -> Result<Vec<NodeRecord>, MembershipError> {
        Ok(self.load().await?.nodes)
    }

    async fn resolve_agent_port(&self, address: &str) -> Result<Option<u16>, MembershipError> {
        Ok(self.load().await?.agent_ports.get(address).copied())
    }
}
