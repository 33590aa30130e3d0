use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use monitor_broker::EnqueueClient;
use tracing::{info, warn};

use crate::aggregate::check_internet;
use crate::correlator::Correlator;
use crate::idp_name::IdpName;

pub struct AppState<C> {
    pub correlator: Arc<Correlator<C>>,
    pub http: reqwest::Client,
    pub idp_urls: Arc<[String]>,
    /// Per-URL bound of the internet check.
    pub url_timeout: Duration,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            correlator: Arc::clone(&self.correlator),
            http: self.http.clone(),
            idp_urls: Arc::clone(&self.idp_urls),
            url_timeout: self.url_timeout,
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
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

pub fn router<C: EnqueueClient>(state: AppState<C>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/idp/internet", get(handle_internet::<C>))
        .route("/idp/{name}", get(handle_idp::<C>))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Serves until `shutdown` resolves, then drains in-flight requests.
pub async fn serve<C, F>(state: AppState<C>, port: u16, shutdown: F) -> Result<(), ServeError>
where
    C: EnqueueClient,
    F: Future<Output = ()> + Send + 'static,
{
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| ServeError::Bind { addr, source })?;
    info!(addr = %addr, "IDP producer listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServeError::Serve)?;

    info!("IDP producer stopped");
    Ok(())
}

async fn root() -> &'static str {
    "ok"
}

async fn handle_internet<C: EnqueueClient>(State(state): State<AppState<C>>) -> Response {
    let report = check_internet(&state.http, &state.idp_urls, state.url_timeout).await;
    (report.status_code(), Json(report)).into_response()
}

async fn handle_idp<C: EnqueueClient>(
    State(state): State<AppState<C>>,
    Path(name): Path<String>,
) -> StatusCode {
    let Ok(idp) = IdpName::new(name) else {
        warn!("Rejected empty IDP name");
        return StatusCode::BAD_REQUEST;
    };
    state.correlator.check_idp(&idp).await
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );
    response
}
