//! Admin HTTP server for health checks and metrics

use crate::audit;
use crate::metrics;
use crate::pool::ConnectionPool;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Start the admin HTTP server serving /healthz, /readyz, and /metrics.
pub async fn serve_admin(
    addr: SocketAddr,
    pool: Arc<ConnectionPool>,
    shutdown: CancellationToken,
) -> Result<(), hyper::Error> {
    let make_svc = make_service_fn(move |_| {
        let pool = pool.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                let pool = pool.clone();
                async move { Ok::<_, Infallible>(handle(&req, &pool)) }
            }))
        }
    });

    tracing::info!("Admin HTTP server listening on {}", addr);
    Server::try_bind(&addr)?
        .serve(make_svc)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Ready once the first reconciliation pass has completed.
pub fn handle(req: &Request<Body>, pool: &ConnectionPool) -> Response<Body> {
    let path = req.uri().path();
    let (response, status) = match path {
        "/healthz" => (Response::new(Body::from("ok\n")), 200),

        "/readyz" => match pool.last_reconciled() {
            Some(_) => (Response::new(Body::from("ready\n")), 200),
            None => (
                Response::builder()
                    .status(StatusCode::SERVICE_UNAVAILABLE)
                    .body(Body::from("not ready\n"))
                    .expect("response build"),
                503,
            ),
        },

        "/metrics" => {
            let body = metrics::encode_metrics();
            (
                Response::builder()
                    .header("Content-Type", "text/plain; version=0.0.4")
                    .body(Body::from(body))
                    .expect("response build"),
                200,
            )
        }

        _ => (
            Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Body::from("not found\n"))
                .expect("response build"),
            404,
        ),
    };

    if path == "/metrics" || path == "/readyz" {
        audit::admin_http_request(path, status);
    }
    response
}
