//! Order platform process.
//!
//! [`Platform`] wires the order service, the inventory service, the
//! reservation and notification consumers and the outbox relay around one
//! topic exchange. [`create_app`] serves health and Prometheus metrics.

pub mod config;
pub mod error;
pub mod platform;
pub mod routes;
pub mod telemetry;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

pub use config::{Config, LogFormat};
pub use error::{PlatformError, Result};
pub use platform::Platform;

/// Creates the HTTP router for health and metrics.
pub fn create_app(metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/health", get(routes::health::check))
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle)
        .layer(TraceLayer::new_for_http())
}
