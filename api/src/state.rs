//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use std::sync::Arc;
use telemetry::instrumentation::TelemetryInterceptor;
use telemetry::Telemetry;

/// Application state shared across all request handlers.
///
/// Holds the telemetry pipelines and the interceptor built on them. Handlers
/// only read pipeline counters; spans and metrics are recorded by the
/// instrumentation middleware.
#[derive(Clone)]
pub struct AppState {
    telemetry: Telemetry,
    interceptor: Arc<TelemetryInterceptor>,
}

impl AppState {
    /// Creates the state for a telemetry instance.
    #[must_use]
    pub fn new(telemetry: Telemetry) -> Self {
        let interceptor = Arc::new(TelemetryInterceptor::from_telemetry(&telemetry));
        Self {
            telemetry,
            interceptor,
        }
    }

    /// Returns the telemetry pipelines.
    #[must_use]
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Returns the request interceptor.
    #[must_use]
    pub fn interceptor(&self) -> Arc<TelemetryInterceptor> {
        Arc::clone(&self.interceptor)
    }

    /// Returns the service name from the telemetry resource.
    #[must_use]
    pub fn service_name(&self) -> &str {
        self.telemetry.resource().service_name()
    }
}
