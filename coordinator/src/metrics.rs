//! Prometheus metrics for the coordinator service

use once_cell::sync::Lazy;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};

// ── Profiling job metrics ────────────────────────────────────────────────────

pub static JOBS_LAUNCHED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "vantage_jobs_launched_total",
        "Profiling jobs forwarded to node agents"
    )
    .unwrap()
});

pub static JOBS_COMPLETED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vantage_jobs_completed_total",
        "Profiling jobs that reached a terminal state",
        &["status"]
    )
    .unwrap()
});

pub static JOBS_TRACKED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "vantage_jobs_tracked",
        "Profiling jobs held by the tracker (never pruned)"
    )
    .unwrap()
});

// ── Connection pool metrics ──────────────────────────────────────────────────

pub static POOL_CONNECTIONS: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "vantage_pool_connections",
        "Live agent channels in the connection pool"
    )
    .unwrap()
});

pub static RECONCILE_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vantage_reconcile_total",
        "Reconciliation passes",
        &["status"]
    )
    .unwrap()
});

pub static RECONCILE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "vantage_reconcile_duration_seconds",
        "Reconciliation pass latency",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]
    )
    .unwrap()
});

// ── API metrics ──────────────────────────────────────────────────────────────

pub static API_REQUESTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vantage_api_requests_total",
        "HTTP API requests",
        &["route", "status"]
    )
    .unwrap()
});

/// Render all registered metrics to Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
