//! Scrape Server - `/metrics` and `/live` over axum
//!
//! Serves the registry's text exposition for Prometheus scrapers and a
//! liveness check. Render failures answer 500 with the error text; a
//! scrape never receives partial output.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::registry::{MetricRegistry, TEXT_CONTENT_TYPE};

/// Build the scrape router for `registry`.
pub fn router(registry: Arc<MetricRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(scrape))
        .route("/live", get(liveness))
        .with_state(registry)
}

/// GET /metrics: the text exposition of every instrument.
async fn scrape(State(registry): State<Arc<MetricRegistry>>) -> Response {
    match registry.render() {
        Ok(body) => ([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Axum-based scrape server.
pub struct MetricsServer {
    /// Registry rendered on every scrape.
    registry: Arc<MetricRegistry>,
    /// Bind address, e.g. `0.0.0.0:9090`.
    bind_address: String,
}

impl MetricsServer {
    /// Create a new scrape server.
    pub fn new(registry: Arc<MetricRegistry>, bind_address: impl Into<String>) -> Self {
        Self {
            registry,
            bind_address: bind_address.into(),
        }
    }

    /// Bind and serve until the shutdown signal fires.
    ///
    /// # Errors
    /// Bind or serve failures.
    #[instrument(skip(self, shutdown_rx), fields(address = %self.bind_address))]
    pub async fn run(self, shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.bind_address).await?;
        info!(address = %self.bind_address, "Prometheus metrics server started");
        serve(listener, self.registry, shutdown_rx).await
    }
}

/// Serve the scrape router on an already bound listener.
///
/// # Errors
/// Serve failures.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<MetricRegistry>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(registry))
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;
    Ok(())
}
