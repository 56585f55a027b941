//! Serves the Prometheus metrics of the relayer.

use std::net::SocketAddr;

use anyhow::Context;
use hub_relayer_core::config::MetricsConfig;
use prometheus::{Encoder, TextEncoder};
use tracing::{error, info};
use warp::Filter;

/// Renders every registered metric in the Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Serves `/metrics` on the configured address until the process exits.
///
/// # Errors
/// Returns an error if the configured address is invalid.
pub async fn serve_metrics(config: MetricsConfig) -> anyhow::Result<()> {
    let socket_addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .with_context(|| format!("Invalid metrics address {}:{}", config.address, config.port))?;

    let metrics_route = warp::path("metrics").map(render_metrics);

    info!("Metrics available at http://{socket_addr}/metrics");
    warp::serve(metrics_route).run(socket_addr).await;
    Ok(())
}
