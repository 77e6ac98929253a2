//! Health check endpoint.
//!
//! Provides a health check endpoint for load balancers and monitoring systems,
//! including the counters of the telemetry pipelines.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use telemetry::TelemetryStats;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status (always "healthy" if reachable).
    pub status: &'static str,
    /// Service name from the telemetry resource.
    pub service: String,
    /// Service version.
    pub version: &'static str,
    /// Pipeline counters per signal.
    pub telemetry: TelemetryStats,
}

/// Creates the health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
///
/// Export failures never make the service unhealthy; they show up in the
/// `dropped` and `failed_batches` counters instead.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: state.service_name().to_string(),
        version: env!("CARGO_PKG_VERSION"),
        telemetry: state.telemetry().stats(),
    })
}
