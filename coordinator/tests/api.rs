//! HTTP API routing, status codes and response shapes.

mod common;

use common::{wait_terminal, ManualConnector};
use hyper::{Body, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use vantage_coordinator::agent::ProfilingReply;
use vantage_coordinator::membership::InMemoryMembership;
use vantage_coordinator::server::api::{handle_api, ApiState};
use vantage_coordinator::{Coordinator, CoordinatorSettings};
use vantage_shared::{JobId, NodeRecord};

async fn setup(api_token: Option<&str>) -> (Coordinator, Arc<ManualConnector>, ApiState) {
    let membership = Arc::new(InMemoryMembership::new());
    membership.set_nodes(vec![NodeRecord::new("A", "10.0.0.1")]);
    membership.publish_port("10.0.0.1", 52365);
    let connector = Arc::new(ManualConnector::default());
    let coordinator = Coordinator::init(
        CoordinatorSettings {
            reconcile_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_millis(50),
        },
        membership,
        connector.clone(),
    )
    .await;
    let state = ApiState::new(&coordinator, api_token.map(str::to_string));
    (coordinator, connector, state)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn launch_status_and_info() {
    let (coordinator, connector, state) = setup(None).await;

    let res = handle_api(
        &get("/api/launch_profiling?node_id=A&pid=123&duration=5"),
        &state,
    );
    assert_eq!(res.status(), StatusCode::OK);
    let job_id = body_json(res).await["result"].as_str().unwrap().to_string();

    let status_uri = format!("/api/check_profiling_status?profiling_id={}", job_id);
    let res = handle_api(&get(&status_uri), &state);
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({"result": {"status": "pending"}}));

    let info_uri = format!("/api/get_profiling_info?profiling_id={}", job_id);
    let res = handle_api(&get(&info_uri), &state);
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(res).await, json!({"error": "profiling not finished"}));

    connector
        .agent("10.0.0.1:52365")
        .reply(ProfilingReply::success(r#"{"flamegraph": [1, 2, 3]}"#));
    wait_terminal(&coordinator, &JobId::from(job_id.as_str())).await;

    let res = handle_api(&get(&status_uri), &state);
    assert_eq!(body_json(res).await, json!({"result": {"status": "finished"}}));

    let res = handle_api(&get(&info_uri), &state);
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({"flamegraph": [1, 2, 3]}));

    coordinator.teardown().await;
}

#[tokio::test]
async fn error_status_carries_message() {
    let (coordinator, connector, state) = setup(None).await;
    let res = handle_api(&get("/api/launch_profiling?node_id=A&pid=7&duration=1"), &state);
    let job_id = body_json(res).await["result"].as_str().unwrap().to_string();

    connector
        .agent("10.0.0.1:52365")
        .reply(ProfilingReply::failure("permission denied"));
    wait_terminal(&coordinator, &JobId::from(job_id.as_str())).await;

    let res = handle_api(
        &get(&format!("/api/check_profiling_status?profiling_id={}", job_id)),
        &state,
    );
    assert_eq!(
        body_json(res).await,
        json!({"result": {"status": "error", "error": "permission denied"}})
    );

    let res = handle_api(
        &get(&format!("/api/get_profiling_info?profiling_id={}", job_id)),
        &state,
    );
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error = body_json(res).await["error"].as_str().unwrap().to_string();
    assert!(error.ends_with("failed: permission denied"), "{}", error);

    coordinator.teardown().await;
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let (coordinator, _, state) = setup(None).await;

    let cases = [
        ("/api/launch_profiling?node_id=C&pid=1&duration=5", StatusCode::NOT_FOUND),
        ("/api/launch_profiling?node_id=A&duration=5", StatusCode::BAD_REQUEST),
        ("/api/launch_profiling?node_id=A&pid=abc&duration=5", StatusCode::BAD_REQUEST),
        ("/api/launch_profiling?node_id=A&pid=1&duration=0", StatusCode::BAD_REQUEST),
        ("/api/check_profiling_status?profiling_id=nope", StatusCode::NOT_FOUND),
        ("/api/check_profiling_status", StatusCode::BAD_REQUEST),
        ("/api/get_profiling_info?profiling_id=nope", StatusCode::NOT_FOUND),
        ("/api/unknown", StatusCode::NOT_FOUND),
    ];
    for (uri, expected) in cases {
        assert_eq!(handle_api(&get(uri), &state).status(), expected, "{}", uri);
    }
    assert!(coordinator.jobs().is_empty());

    let post = Request::post("/api/launch_profiling").body(Body::empty()).unwrap();
    assert_eq!(
        handle_api(&post, &state).status(),
        StatusCode::METHOD_NOT_ALLOWED
    );

    coordinator.teardown().await;
}

#[tokio::test]
async fn nodes_and_dump() {
    let (coordinator, _, state) = setup(None).await;

    let res = handle_api(&get("/api/nodes"), &state);
    let body = body_json(res).await;
    assert_eq!(body["result"][0]["node_id"], "A");
    assert_eq!(body["result"][0]["endpoint"], "10.0.0.1:52365");

    handle_api(&get("/api/launch_profiling?node_id=A&pid=1&duration=1"), &state);

    let res = handle_api(&get("/api/dump"), &state);
    let body = body_json(res).await;
    assert_eq!(body["success"], true);
    assert!(body["data"]["nodes"]["A"].is_object());
    assert_eq!(body["data"]["jobs"].as_object().unwrap().len(), 1);

    let res = handle_api(&get("/api/dump?key=nodes"), &state);
    let body = body_json(res).await;
    assert!(body["data"]["nodes"]["A"].is_object());
    assert!(body["data"].get("jobs").is_none());

    let res = handle_api(&get("/api/dump?key=secrets"), &state);
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    coordinator.teardown().await;
}

#[tokio::test]
async fn token_is_enforced_when_configured() {
    let (coordinator, _, state) = setup(Some("s3cret")).await;

    let res = handle_api(&get("/api/nodes"), &state);
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let authed = Request::get("/api/nodes")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    assert_eq!(handle_api(&authed, &state).status(), StatusCode::OK);

    let preflight = Request::options("/api/nodes").body(Body::empty()).unwrap();
    assert_eq!(handle_api(&preflight, &state).status(), StatusCode::NO_CONTENT);

    coordinator.teardown().await;
}

#[tokio::test]
async fn percent_encoded_parameters_are_decoded() {
    let membership = Arc::new(InMemoryMembership::new());
    membership.set_nodes(vec![NodeRecord::new("node:1/a b", "10.0.0.9")]);
    membership.publish_port("10.0.0.9", 52365);
    let connector = Arc::new(ManualConnector::default());
    let coordinator = Coordinator::init(
        CoordinatorSettings {
            reconcile_interval: Duration::from_secs(3600),
            shutdown_grace: Duration::from_millis(50),
        },
        membership,
        connector.clone(),
    )
    .await;
    let state = ApiState::new(&coordinator, None);

    let res = handle_api(
        &get("/api/launch_profiling?node_id=node%3A1%2Fa%20b&pid=1&duration=5"),
        &state,
    );
    assert_eq!(res.status(), StatusCode::OK);
    let job_id = body_json(res).await["result"].as_str().unwrap().to_string();
    assert_eq!(
        connector.agent("10.0.0.9:52365").outstanding(),
        vec![(1, Duration::from_secs(5))]
    );

    let res = handle_api(
        &get(&format!(
            "/api/check_profiling_status?profiling_id={}",
            urlencoding::encode(&job_id)
        )),
        &state,
    );
    assert_eq!(res.status(), StatusCode::OK);

    let res = handle_api(&get("/api/dump?key=%6Eodes"), &state);
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_json(res).await["data"]["nodes"]["node:1/a b"].is_object());

    let res = handle_api(&get("/api/launch_profiling?node_id=%FF&pid=1&duration=5"), &state);
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    coordinator.teardown().await;
}
