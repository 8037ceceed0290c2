//! Read-only introspection over explicitly registered named mappings.
//!
//! Components opt in by implementing [`Introspect`] and being registered
//! under a name at startup; `/api/dump` serves the registry.

use crate::jobs::JobTracker;
use crate::pool::ConnectionPool;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A component that can render its state as a JSON object.
pub trait Introspect: Send + Sync {
    fn dump(&self) -> Value;
}

impl Introspect for ConnectionPool {
    fn dump(&self) -> Value {
        let entries: Map<String, Value> = self
            .connections()
            .into_iter()
            .map(|c| {
                (
                    c.node_id.to_string(),
                    serde_json::json!({
                        "endpoint": c.endpoint,
                        "connected_at": c.connected_at,
                    }),
                )
            })
            .collect();
        Value::Object(entries)
    }
}

impl Introspect for JobTracker {
    fn dump(&self) -> Value {
        let entries: Map<String, Value> = self
            .summaries()
            .into_iter()
            .map(|s| {
                let key = s.job_id.to_string();
                (key, serde_json::to_value(s).unwrap_or(Value::Null))
            })
            .collect();
        Value::Object(entries)
    }
}

#[derive(Default, Clone)]
pub struct IntrospectRegistry {
    sources: BTreeMap<String, Arc<dyn Introspect>>,
}

impl IntrospectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, source: Arc<dyn Introspect>) -> Self {
        self.sources.insert(name.into(), source);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    /// Dump one mapping, or `None` if nothing is registered under `key`.
    pub fn dump(&self, key: &str) -> Option<Value> {
        self.sources.get(key).map(|source| source.dump())
    }

    /// Dump every registered mapping keyed by name.
    pub fn dump_all(&self) -> Value {
        Value::Object(
            self.sources
                .iter()
                .map(|(name, source)| (name.clone(), source.dump()))
                .collect(),
        )
    }
}
