//! Bearer token authentication for the profiling API

use crate::audit;
use hyper::HeaderMap;

/// Check the `authorization` header against `expected_token`.
///
/// If `expected_token` is `None`, authentication is disabled and all requests pass.
/// If set, requests must include `authorization: Bearer <token>`. On failure the
/// returned reason is safe to send back to the caller.
pub fn check_bearer(
    headers: &HeaderMap,
    path: &str,
    expected_token: Option<&str>,
) -> Result<(), &'static str> {
    let Some(expected) = expected_token else {
        return Ok(());
    };

    let reason = match headers.get(hyper::header::AUTHORIZATION) {
        Some(val) => match val.to_str() {
            Ok(val_str) => match val_str.strip_prefix("Bearer ") {
                Some(token) if token == expected => {
                    audit::api_auth_success(path);
                    return Ok(());
                }
                Some(_) => "Invalid token",
                None => "Missing Bearer prefix",
            },
            Err(_) => "Invalid authorization header encoding",
        },
        None => "Missing authorization header",
    };

    audit::api_auth_failure(path, reason);
    Err(reason)
}
