//! HTTP server for Prometheus scraping
//!
//! Serves the collector's registry in Prometheus text format on a configurable
//! address and path, and shuts down when the cancellation token fires.

use crate::metrics::MetricsCollector;
use axum::{Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
struct MetricsServerState {
    collector: MetricsCollector,
}

/// Router exposing the registry at `path`
pub fn metrics_router(collector: MetricsCollector, path: &str) -> Router {
    Router::new()
        .route(path, get(metrics_handler))
        .with_state(MetricsServerState { collector })
}

/// Bind `listen` and serve metrics until `shutdown` is cancelled
pub async fn start_metrics_server(
    collector: MetricsCollector,
    listen: SocketAddr,
    path: String,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!(
        listen = %listener.local_addr()?,
        path = %path,
        "Metrics server listening"
    );

    let app = metrics_router(collector, &path);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Metrics server stopped");
    Ok(())
}

/// Encode every metric family in the registry
pub fn render_metrics(collector: &MetricsCollector) -> Result<(String, Vec<u8>), prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&collector.registry.gather(), &mut buffer)?;
    Ok((encoder.format_type().to_string(), buffer))
}

async fn metrics_handler(State(state): State<MetricsServerState>) -> impl IntoResponse {
    match render_metrics(&state.collector) {
        Ok((content_type, body)) => {
            (StatusCode::OK, [("content-type", content_type)], body).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}
