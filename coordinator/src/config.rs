//! Coordinator configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `VANTAGE_*` environment variables.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Listen address for the profiling HTTP API
    pub api_addr: String,

    /// Admin HTTP listen address (health checks + metrics)
    pub admin_addr: String,

    /// Seconds between two reconciliation passes
    pub reconcile_interval_secs: u64,

    /// JSON membership document re-read on every pass
    pub membership_file: PathBuf,

    /// Agent connect timeout in seconds
    pub connect_timeout_secs: u64,

    /// How long teardown waits for in-flight profiling calls
    pub shutdown_grace_secs: u64,

    /// Optional bearer token required on the HTTP API
    pub api_token: Option<String>,

    /// Optional bearer token sent to node agents
    pub agent_token: Option<String>,

    pub log_format: LogFormat,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            api_addr: "0.0.0.0:8265".to_string(),
            admin_addr: "0.0.0.0:9091".to_string(),
            reconcile_interval_secs: crate::DEFAULT_RECONCILE_INTERVAL_SECS,
            membership_file: PathBuf::from("nodes.json"),
            connect_timeout_secs: 5,
            shutdown_grace_secs: 5,
            api_token: None,
            agent_token: None,
            log_format: LogFormat::Text,
        }
    }
}

impl CoordinatorConfig {
    /// Load defaults, then `path` (if any), then `VANTAGE_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&Self::default()).context("Failed to encode default config")?,
        );
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(Environment::with_prefix("VANTAGE"));

        let config: Self = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn api_socket_addr(&self) -> Result<SocketAddr> {
        self.api_addr.parse().context("Invalid api_addr")
    }

    pub fn admin_socket_addr(&self) -> Result<SocketAddr> {
        self.admin_addr.parse().context("Invalid admin_addr")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.reconcile_interval_secs == 0 {
            anyhow::bail!("reconcile_interval_secs must be greater than 0");
        }
        self.api_socket_addr()?;
        self.admin_socket_addr()?;
        Ok(())
    }
}
