//! HTTP status service.
//!
//! A read-only projection of the session over HTTP. Handlers take the
//! session lock for one read and never call into the driver.
//!
//! # Routes
//!
//! | Route | Response |
//! |-------|----------|
//! | `GET /elapsed-time` | `200` [`StatusReport`](crate::session::StatusReport) or `400 {"error": ...}` |
//! | `GET /session` | `200` full [`Session`](crate::session::Session) snapshot |
//! | `GET /` | Status page |
//!
//! JSON responses carry `Access-Control-Allow-Origin: *` so a page served
//! from elsewhere can poll the bridge.

// ============================================================================
// Submodules
// ============================================================================

/// Static status page.
pub mod assets;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::SessionHandle;
use crate::shutdown::Shutdown;

// ============================================================================
// Types
// ============================================================================

/// Shared handler state. Holds no mutable state of its own.
#[derive(Clone)]
struct AppState {
    session: SessionHandle,
    page: Arc<str>,
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Human-readable error message.
    pub error: String,
}

// ============================================================================
// Router
// ============================================================================

/// Builds the HTTP router over `session`.
///
/// `poll_interval` is how often the status page refreshes.
pub fn router(session: SessionHandle, poll_interval: Duration) -> Router {
    let state = AppState {
        session,
        page: assets::build_status_page(poll_interval).into(),
    };

    Router::new()
        .route("/", get(index))
        .route("/elapsed-time", get(elapsed_time))
        .route("/session", get(session_snapshot))
        .with_state(state)
}

/// Serves the router on `listener` until `shutdown` is triggered.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the server fails.
pub async fn serve(
    listener: TcpListener,
    session: SessionHandle,
    poll_interval: Duration,
    shutdown: Shutdown,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "HTTP status service listening");
    }

    axum::serve(listener, router(session, poll_interval))
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    debug!("HTTP status service stopped");
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.page.to_string())
}

async fn elapsed_time(State(state): State<AppState>) -> Response {
    match state.session.status_report() {
        Ok(report) => json_response(StatusCode::OK, &report),
        Err(e) => {
            let status = if e.is_query_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            json_response(
                status,
                &ErrorBody {
                    error: e.to_string(),
                },
            )
        }
    }
}

async fn session_snapshot(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, &state.session.snapshot())
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    (
        status,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        Json(body),
    )
        .into_response()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::SocketAddr;

    use serde_json::{Value, json};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::task::JoinHandle;

    struct TestServer {
        addr: SocketAddr,
        shutdown: Shutdown,
        handle: JoinHandle<Result<()>>,
    }

    impl TestServer {
        async fn start(session: SessionHandle) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0")
                .await
                .expect("bind should succeed");
            let addr = listener.local_addr().expect("local addr");
            let shutdown = Shutdown::new();
            let handle = tokio::spawn(serve(
                listener,
                session,
                Duration::from_secs(1),
                shutdown.clone(),
            ));
            Self {
                addr,
                shutdown,
                handle,
            }
        }

        async fn stop(self) {
            self.shutdown.trigger();
            self.handle
                .await
                .expect("server task")
                .expect("server exits cleanly");
        }
    }

    /// Sends a raw HTTP/1.1 GET and returns (status, headers, body).
    async fn http_get(addr: SocketAddr, path: &str) -> (u16, String, String) {
        let mut stream = TcpStream::connect(addr).await.expect("connect");
        let request = format!(
            "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.expect("write");

        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.expect("read");

        let (head, body) = raw.split_once("\r\n\r\n").expect("header terminator");
        let status = head
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .expect("status code");
        (status, head.to_ascii_lowercase(), body.to_string())
    }

    #[tokio::test]
    async fn test_not_yet_calculated_is_400() {
        let server = TestServer::start(SessionHandle::new()).await;

        let (status, _, body) = http_get(server.addr, "/elapsed-time").await;
        assert_eq!(status, 400);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body, json!({"error": "Elapsed time not yet calculated"}));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_running_reports_start_with_nulls() {
        let session = SessionHandle::new();
        session.begin(1000).unwrap();
        session.tick(1000);
        let server = TestServer::start(session).await;

        let (status, headers, body) = http_get(server.addr, "/elapsed-time").await;
        assert_eq!(status, 200);
        assert!(headers.contains("access-control-allow-origin: *"));
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            json!({"status": "START", "minutes": null, "seconds": null, "milliseconds": null})
        );

        server.stop().await;
    }

    #[tokio::test]
    async fn test_completed_reports_stop_triple() {
        let session = SessionHandle::new();
        session.begin(1000).unwrap();
        session.complete(4530).unwrap();
        let server = TestServer::start(session).await;

        for _ in 0..3 {
            let (status, _, body) = http_get(server.addr, "/elapsed-time").await;
            assert_eq!(status, 200);
            let body: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(
                body,
                json!({"status": "STOP", "minutes": 0, "seconds": 3, "milliseconds": 530})
            );
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn test_invalid_interval_is_400_not_negative() {
        let session = SessionHandle::new();
        session.begin(5000).unwrap();
        session.complete(1000).unwrap();
        let server = TestServer::start(session).await;

        let (status, _, body) = http_get(server.addr, "/elapsed-time").await;
        assert_eq!(status, 400);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert!(body["error"].as_str().unwrap().contains("invalid"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_session_snapshot_exposes_interim_elapsed() {
        let session = SessionHandle::new();
        session.begin(0).unwrap();
        session.tick(1000);
        session.tick(1000);
        let server = TestServer::start(session).await;

        let (status, _, body) = http_get(server.addr, "/session").await;
        assert_eq!(status, 200);
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["status"], "running");
        assert_eq!(body["elapsed_ms"], 2000);
        assert_eq!(body["end_ms"], Value::Null);

        server.stop().await;
    }

    #[tokio::test]
    async fn test_index_serves_page() {
        let server = TestServer::start(SessionHandle::new()).await;

        let (status, headers, body) = http_get(server.addr, "/").await;
        assert_eq!(status, 200);
        assert!(headers.contains("text/html"));
        assert!(body.contains("/elapsed-time"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = TestServer::start(SessionHandle::new()).await;
        let (status, _, _) = http_get(server.addr, "/nope").await;
        assert_eq!(status, 404);
        server.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_polls_see_whole_reports() {
        let session = SessionHandle::new();
        session.begin(1000).unwrap();
        session.complete(4530).unwrap();
        let server = TestServer::start(session.clone()).await;
        let addr = server.addr;

        let pollers: Vec<_> = (0..100)
            .map(|_| tokio::spawn(async move { http_get(addr, "/elapsed-time").await }))
            .collect();

        session.begin(10_000).unwrap();
        session.complete(12_000).unwrap();

        let old = json!({"status": "STOP", "minutes": 0, "seconds": 3, "milliseconds": 530});
        let new = json!({"status": "STOP", "minutes": 0, "seconds": 2, "milliseconds": 0});
        let running =
            json!({"status": "START", "minutes": null, "seconds": null, "milliseconds": null});

        for poller in pollers {
            let (status, _, body) = poller.await.expect("poller task");
            assert_eq!(status, 200);
            let body: Value = serde_json::from_str(&body).unwrap();
            assert!(
                body == old || body == new || body == running,
                "torn report: {body}"
            );
        }

        server.stop().await;
    }
}
