//! Audit logging for security and operational events.
//!
//! All events are emitted via `tracing` with a dedicated target so they can be
//! filtered and formatted (e.g. JSON) for audit pipelines.

use tracing::{error, info, warn};

const AUDIT_TARGET: &str = "vantage::audit";

/// Log API authentication success (valid Bearer token or auth disabled).
pub fn api_auth_success(path: &str) {
    info!(
        target: AUDIT_TARGET,
        event = "api_auth_success",
        result = "ok",
        path = %path,
    );
}

/// Log API authentication failure.
pub fn api_auth_failure(path: &str, reason: &str) {
    warn!(
        target: AUDIT_TARGET,
        event = "api_auth_failure",
        result = "denied",
        path = %path,
        reason = %reason,
    );
}

/// Log a profiling request forwarded to a node agent.
pub fn profiling_launched(job_id: &str, node_id: &str, pid: i32, duration_secs: u64) {
    info!(
        target: AUDIT_TARGET,
        event = "profiling_launched",
        job_id = %job_id,
        node_id = %node_id,
        pid = pid,
        duration_secs = duration_secs,
    );
}

/// Log a completion that arrived for an already terminal job.
pub fn completion_violation(job_id: &str, reason: &str) {
    error!(
        target: AUDIT_TARGET,
        event = "completion_violation",
        job_id = %job_id,
        reason = %reason,
    );
}

/// Log admin HTTP request (sensitive endpoints: metrics, readiness).
pub fn admin_http_request(path: &str, status: u16) {
    info!(
        target: AUDIT_TARGET,
        event = "admin_http_request",
        path = %path,
        status = %status,
    );
}
