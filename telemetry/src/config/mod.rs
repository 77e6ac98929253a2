//! Configuration module for the telemetry pipeline.
//!
//! This module contains the buffering, retry, and collector connection settings.

pub mod batch;
pub mod exporter;

pub use batch::{BatchConfig, ConfigError, OverflowPolicy, PipelineConfig, RetryConfig, SignalKind};
pub use exporter::{ExporterConfig, Security, DEFAULT_ENDPOINT};

use serde::{Deserialize, Serialize};

/// Everything needed to build the OTLP pipelines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Batching and retry policy.
    pub pipeline: PipelineConfig,
    /// Collector connection.
    pub collector: ExporterConfig,
}

impl TelemetryConfig {
    /// Validates both parts.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.collector.validate()
    }
}
