//! Tracing and metrics bootstrap for portal binaries.

use crate::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,municipal_portal=debug,sqlx=warn";

/// Errors from telemetry setup.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// `METRICS_HOST`/`METRICS_PORT` do not form a socket address
    #[error("Invalid metrics address {host}:{port}")]
    InvalidAddress {
        /// Configured host
        host: String,
        /// Configured port
        port: u16,
    },
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Install the global tracing subscriber.
///
/// Honours `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Register metric descriptions and, when enabled, serve them for Prometheus.
///
/// Must be called from within a Tokio runtime when the exporter is enabled.
///
/// # Errors
///
/// Returns error if the listen address is invalid or the exporter cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> Result<bool, TelemetryError> {
    municipal_portal_core::metrics::register_metrics();
    if !config.enabled {
        tracing::debug!("Metrics exporter disabled");
        return Ok(false);
    }

    let addr = config
        .listen_addr()
        .ok_or_else(|| TelemetryError::InvalidAddress {
            host: config.host.clone(),
            port: config.port,
        })?;

    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(%addr, "Metrics server started - available at http://{addr}/metrics");
            Ok(true)
        }
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains("already initialized") {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                Ok(false)
            } else {
                Err(TelemetryError::Install(err_msg))
            }
        }
    }
}
