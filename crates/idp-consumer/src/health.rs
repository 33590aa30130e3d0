//! Liveness and readiness endpoints for orchestrators.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use monitor_broker::ConnectionStatus;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
pub struct HealthState<S> {
    broker: S,
    started: Instant,
}

impl<S: ConnectionStatus> HealthState<S> {
    pub fn new(broker: S) -> Self {
        Self {
            broker,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("health server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn router<S: ConnectionStatus>(state: HealthState<S>) -> Router {
    Router::new()
        .route("/health/live", get(|| async { Json(json!({ "status": "alive" })) }))
        .route("/health/ready", get(ready::<S>))
        .route("/health/startup", get(|| async { Json(json!({ "status": "started" })) }))
        .route("/health", get(overview::<S>))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not Found") })
        .with_state(state)
}

pub async fn serve<S, F>(state: HealthState<S>, port: u16, shutdown: F) -> Result<(), ServeError>
where
    S: ConnectionStatus,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(addr = %addr, "Health server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve)
}

async fn ready<S: ConnectionStatus>(State(state): State<HealthState<S>>) -> Response {
    if state.broker.is_connected() {
        Json(json!({ "status": "ready", "broker": "connected" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "not ready", "broker": "disconnected" })),
        )
            .into_response()
    }
}

async fn overview<S: ConnectionStatus>(State(state): State<HealthState<S>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "uptime": state.started.elapsed().as_secs_f64(),
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::DateTime;
    use monitor_broker::InMemoryBroker;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    async fn call(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn json_body(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn live_and_startup_always_answer() {
        let app = router(HealthState::new(InMemoryBroker::new()));

        let (status, body) = call(app.clone(), "/health/live").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "status": "alive" }));

        let (status, body) = call(app, "/health/startup").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "status": "started" }));
    }

    #[tokio::test]
    async fn ready_follows_broker_connection() {
        let broker = InMemoryBroker::new();
        let app = router(HealthState::new(broker.clone()));

        let (status, body) = call(app.clone(), "/health/ready").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body), json!({ "status": "ready", "broker": "connected" }));

        broker.disconnect();
        let (status, body) = call(app, "/health/ready").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            json_body(&body),
            json!({ "status": "not ready", "broker": "disconnected" })
        );
    }

    #[tokio::test]
    async fn overview_reports_uptime_and_timestamp() {
        let app = router(HealthState::new(InMemoryBroker::new()));

        let (status, body) = call(app, "/health").await;
        assert_eq!(status, StatusCode::OK);

        let body = json_body(&body);
        assert_eq!(body["status"], "ok");
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
        assert!(timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn unknown_paths_are_404() {
        let app = router(HealthState::new(InMemoryBroker::new()));

        for uri in ["/", "/health/nope", "/idp/fc-idp"] {
            let (status, body) = call(app.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(body, b"Not Found");
        }
    }
}
