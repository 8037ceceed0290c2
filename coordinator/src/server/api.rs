//! Profiling HTTP API.
//! Serves /api/launch_profiling, /api/check_profiling_status,
//! /api/get_profiling_info, /api/nodes and /api/dump with JSON and CORS.

use crate::context::Coordinator;
use crate::dispatcher::{DispatchError, Dispatcher};
use crate::introspect::IntrospectRegistry;
use crate::jobs::JobError;
use crate::metrics;
use crate::pool::{ConnectionPool, PoolError};
use crate::server::auth;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use vantage_shared::{JobId, NodeId};

/// Everything the API handlers read
pub struct ApiState {
    pub dispatcher: Arc<Dispatcher>,
    pub pool: Arc<ConnectionPool>,
    pub introspection: Arc<IntrospectRegistry>,
    pub api_token: Option<String>,
}

impl ApiState {
    pub fn new(coordinator: &Coordinator, api_token: Option<String>) -> Self {
        Self {
            dispatcher: coordinator.dispatcher().clone(),
            pool: coordinator.pool().clone(),
            introspection: coordinator.introspection().clone(),
            api_token,
        }
    }
}

/// Serve the API on `addr` until `shutdown` is cancelled.
pub async fn serve_api(
    addr: SocketAddr,
    state: Arc<ApiState>,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(handle_api(&req, &state)) }
            }))
        }
    });

    tracing::info!("Profiling API listening on {}", addr);
    Server::try_bind(&addr)?
        .serve(make_svc)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn json_response(body: &Value, status: StatusCode) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Body::from(body.to_string()))
        .expect("response build")
}

fn error_response(message: &str, status: StatusCode) -> Response<Body> {
    json_response(&json!({ "error": message }), status)
}

fn cors_preflight() -> Response<Body> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(Body::empty())
        .expect("response build")
}

/// Percent-decoded query parameters. A parameter that does not decode to
/// UTF-8 rejects the whole request.
fn query_params(req: &Request<Body>) -> Result<HashMap<String, String>, Response<Body>> {
    let mut params = HashMap::new();
    if let Some(q) = req.uri().query() {
        for part in q.split('&') {
            if let Some((k, v)) = part.split_once('=') {
                let decode = |raw: &str| {
                    urlencoding::decode(raw).map(|d| d.into_owned()).map_err(|_| {
                        error_response(
                            &format!("query parameter '{}' is not valid UTF-8", k),
                            StatusCode::BAD_REQUEST,
                        )
                    })
                };
                params.insert(decode(k)?, decode(v)?);
            }
        }
    }
    Ok(params)
}

fn required<'a>(params: &'a HashMap<String, String>, key: &str) -> Result<&'a str, Response<Body>> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            error_response(
                &format!("missing query parameter '{}'", key),
                StatusCode::BAD_REQUEST,
            )
        })
}

fn dispatch_error_response(err: &DispatchError) -> Response<Body> {
    let status = match err {
        DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        DispatchError::Pool(PoolError::UnknownNode(_)) => StatusCode::NOT_FOUND,
        DispatchError::Job(JobError::UnknownJob(_)) => StatusCode::NOT_FOUND,
        DispatchError::Job(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(&err.to_string(), status)
}

/// Route one request. Never fails: every error becomes a JSON response.
pub fn handle_api(req: &Request<Body>, state: &ApiState) -> Response<Body> {
    if req.method() == Method::OPTIONS {
        return cors_preflight();
    }

    let path = req.uri().path();
    let response = match auth::check_bearer(req.headers(), path, state.api_token.as_deref()) {
        Err(reason) => error_response(reason, StatusCode::UNAUTHORIZED),
        Ok(()) if req.method() != Method::GET => {
            error_response("method not allowed", StatusCode::METHOD_NOT_ALLOWED)
        }
        Ok(()) => match query_params(req) {
            Ok(params) => route(path, &params, state),
            Err(response) => response,
        },
    };

    metrics::API_REQUESTS
        .with_label_values(&[route_label(path), response.status().as_str()])
        .inc();
    response
}

fn route_label(path: &str) -> &'static str {
    match path {
        "/api/launch_profiling" => "launch_profiling",
        "/api/check_profiling_status" => "check_profiling_status",
        "/api/get_profiling_info" => "get_profiling_info",
        "/api/nodes" => "nodes",
        "/api/dump" => "dump",
        _ => "other",
    }
}

fn route(path: &str, params: &HashMap<String, String>, state: &ApiState) -> Response<Body> {
    let result = match path {
        "/api/launch_profiling" => launch_profiling(params, state),
        "/api/check_profiling_status" => check_profiling_status(params, state),
        "/api/get_profiling_info" => get_profiling_info(params, state),
        "/api/nodes" => Ok(json_response(
            &json!({ "result": state.pool.connections() }),
            StatusCode::OK,
        )),
        "/api/dump" => Ok(dump(params, state)),
        _ => Ok(error_response("not found", StatusCode::NOT_FOUND)),
    };
    result.unwrap_or_else(|response| response)
}

fn launch_profiling(
    params: &HashMap<String, String>,
    state: &ApiState,
) -> Result<Response<Body>, Response<Body>> {
    let node_id = NodeId::new(required(params, "node_id")?);
    let pid: i32 = required(params, "pid")?.parse().map_err(|_| {
        error_response("pid must be an integer", StatusCode::BAD_REQUEST)
    })?;
    let duration: u64 = required(params, "duration")?.parse().map_err(|_| {
        error_response(
            "duration must be a whole number of seconds",
            StatusCode::BAD_REQUEST,
        )
    })?;

    match state
        .dispatcher
        .launch(&node_id, pid, Duration::from_secs(duration))
    {
        Ok(job_id) => Ok(json_response(&json!({ "result": job_id }), StatusCode::OK)),
        Err(e) => {
            tracing::warn!(node_id = %node_id, "Launch rejected: {}", e);
            Err(dispatch_error_response(&e))
        }
    }
}

fn check_profiling_status(
    params: &HashMap<String, String>,
    state: &ApiState,
) -> Result<Response<Body>, Response<Body>> {
    let job_id = JobId::from(required(params, "profiling_id")?);
    let status = state
        .dispatcher
        .status(&job_id)
        .map_err(|e| dispatch_error_response(&e))?;
    Ok(json_response(&json!({ "result": status }), StatusCode::OK))
}

fn get_profiling_info(
    params: &HashMap<String, String>,
    state: &ApiState,
) -> Result<Response<Body>, Response<Body>> {
    let job_id = JobId::from(required(params, "profiling_id")?);
    match state.dispatcher.result(&job_id) {
        Ok(payload) => Ok(json_response(&payload, StatusCode::OK)),
        Err(e) => {
            match &e {
                // Caller bug: the payload was requested before the job finished
                DispatchError::Job(JobError::NotFinished(_)) => {
                    tracing::error!(job_id = %job_id, "Profiling info requested too early")
                }
                DispatchError::Job(JobError::Failed { .. }) => {
                    tracing::warn!(job_id = %job_id, "Profiling info requested for failed job: {}", e)
                }
                _ => tracing::debug!(job_id = %job_id, "Profiling info lookup failed: {}", e),
            }
            Err(dispatch_error_response(&e))
        }
    }
}

fn dump(params: &HashMap<String, String>, state: &ApiState) -> Response<Body> {
    match params.get("key").filter(|k| !k.is_empty()) {
        None => json_response(
            &json!({
                "success": true,
                "message": "Fetch all data success.",
                "data": state.introspection.dump_all(),
            }),
            StatusCode::OK,
        ),
        Some(key) => match state.introspection.dump(key) {
            Some(data) => json_response(
                &json!({
                    "success": true,
                    "message": format!("Fetch {} success.", key),
                    "data": { key.as_str(): data },
                }),
                StatusCode::OK,
            ),
            None => json_response(
                &json!({
                    "success": false,
                    "message": format!(
                        "Unknown key '{}'; available: {}",
                        key,
                        state.introspection.keys().collect::<Vec<_>>().join(", ")
                    ),
                }),
                StatusCode::NOT_FOUND,
            ),
        },
    }
}
