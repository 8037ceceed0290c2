//! Coordinator service library
//!
//! Tracks cluster membership, keeps one agent channel per live node and
//! forwards profiling requests to those agents, correlating each
//! asynchronous reply with the job the caller polls.

/// Default seconds between two reconciliation passes.
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 10;

pub mod agent;
pub mod audit;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod introspect;
pub mod jobs;
pub mod membership;
pub mod metrics;
pub mod pool;
pub mod reconcile;
pub mod server;

pub use context::{Coordinator, CoordinatorSettings};
