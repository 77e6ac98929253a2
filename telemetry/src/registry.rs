//! Telemetry assembly and the process-wide registry.
//!
//! [`TelemetryBuilder`] validates the configuration and creates the three
//! providers in a fixed order (traces, metrics, logs). [`install`] publishes
//! the result once per process; [`global`] reads it back.

use crate::config::{ConfigError, ExporterConfig, PipelineConfig, SignalKind, TelemetryConfig};
use crate::export::{ExportError, Exporter, LogExporter, MetricExporter, SpanExporter};
use crate::models::{LogRecord, MetricPoint, Span};
use crate::provider::{LoggerProvider, MeterProvider, ProviderStats, TracerProvider};
use crate::resource::Resource;
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

static GLOBAL: OnceLock<Telemetry> = OnceLock::new();

/// Errors from building a [`Telemetry`] instance.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The pipeline or exporter configuration is invalid.
    #[error("invalid telemetry configuration: {0}")]
    Config(#[from] ConfigError),

    /// An exporter could not be created.
    #[error("failed to create exporter: {0}")]
    Export(#[from] ExportError),

    /// Neither a custom exporter nor a collector endpoint was given.
    #[error("no exporter configured for {0}")]
    MissingExporter(SignalKind),
}

/// Errors from the process-wide registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// [`install`] was already called in this process.
    #[error("telemetry is already installed")]
    AlreadyInstalled,
}

/// Counters for all three pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryStats {
    /// Trace pipeline counters.
    pub traces: ProviderStats,
    /// Metric pipeline counters.
    pub metrics: ProviderStats,
    /// Log pipeline counters.
    pub logs: ProviderStats,
}

/// The three providers plus the resource describing this service.
///
/// Cloning is cheap; clones share the same providers.
#[derive(Debug, Clone)]
pub struct Telemetry {
    resource: Resource,
    tracer_provider: TracerProvider,
    meter_provider: MeterProvider,
    logger_provider: LoggerProvider,
}

impl Telemetry {
    /// Starts building telemetry for `resource`.
    #[must_use]
    pub fn builder(resource: Resource) -> TelemetryBuilder {
        TelemetryBuilder::new(resource)
    }

    /// The resource attached to every export.
    #[must_use]
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The trace provider.
    #[must_use]
    pub fn tracer_provider(&self) -> &TracerProvider {
        &self.tracer_provider
    }

    /// The metric provider.
    #[must_use]
    pub fn meter_provider(&self) -> &MeterProvider {
        &self.meter_provider
    }

    /// The log provider.
    #[must_use]
    pub fn logger_provider(&self) -> &LoggerProvider {
        &self.logger_provider
    }

    /// Counters for all pipelines.
    #[must_use]
    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            traces: self.tracer_provider.stats(),
            metrics: self.meter_provider.stats(),
            logs: self.logger_provider.stats(),
        }
    }

    /// Flushes all pipelines concurrently, each bounded by `timeout`.
    ///
    /// Returns true only if every pipeline finished in time.
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        let (traces, metrics, logs) = tokio::join!(
            self.tracer_provider.force_flush(timeout),
            self.meter_provider.force_flush(timeout),
            self.logger_provider.force_flush(timeout),
        );
        traces && metrics && logs
    }

    /// Shuts down all pipelines concurrently, each bounded by `timeout`.
    ///
    /// Returns true only if every pipeline drained in time. Calls after the
    /// first return false.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        let (traces, metrics, logs) = tokio::join!(
            self.tracer_provider.shutdown(timeout),
            self.meter_provider.shutdown(timeout),
            self.logger_provider.shutdown(timeout),
        );
        tracing::info!(traces, metrics, logs, "Telemetry shut down");
        traces && metrics && logs
    }
}

/// Builder for [`Telemetry`].
///
/// Each signal uses its custom exporter if one was given, otherwise an OTLP
/// exporter for the configured collector.
#[must_use]
pub struct TelemetryBuilder {
    resource: Resource,
    pipeline: PipelineConfig,
    collector: Option<ExporterConfig>,
    span_exporter: Option<Arc<dyn Exporter<Span>>>,
    metric_exporter: Option<Arc<dyn Exporter<MetricPoint>>>,
    log_exporter: Option<Arc<dyn Exporter<LogRecord>>>,
}

impl TelemetryBuilder {
    /// Creates a builder with default pipeline settings and no exporters.
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            pipeline: PipelineConfig::default(),
            collector: None,
            span_exporter: None,
            metric_exporter: None,
            log_exporter: None,
        }
    }

    /// Creates a builder exporting every signal to the configured collector.
    pub fn from_config(resource: Resource, config: TelemetryConfig) -> Self {
        Self::new(resource)
            .with_pipeline(config.pipeline)
            .with_collector(config.collector)
    }

    /// Sets batching and retry policy.
    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Exports to an OTLP/gRPC collector.
    pub fn with_collector(mut self, collector: ExporterConfig) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Overrides the span exporter.
    pub fn with_span_exporter(mut self, exporter: Arc<dyn Exporter<Span>>) -> Self {
        self.span_exporter = Some(exporter);
        self
    }

    /// Overrides the metric exporter.
    pub fn with_metric_exporter(mut self, exporter: Arc<dyn Exporter<MetricPoint>>) -> Self {
        self.metric_exporter = Some(exporter);
        self
    }

    /// Overrides the log exporter.
    pub fn with_log_exporter(mut self, exporter: Arc<dyn Exporter<LogRecord>>) -> Self {
        self.log_exporter = Some(exporter);
        self
    }

    /// Validates the configuration and starts the providers.
    ///
    /// Must be called inside a tokio runtime. Nothing connects to the
    /// collector until the first export.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a signal has no
    /// exporter.
    pub fn build(self) -> Result<Telemetry, BuildError> {
        let Self {
            resource,
            pipeline,
            collector,
            span_exporter,
            metric_exporter,
            log_exporter,
        } = self;

        pipeline.validate()?;
        if let Some(collector) = &collector {
            collector.validate()?;
        }
        let collector_for = |kind| collector.clone().ok_or(BuildError::MissingExporter(kind));

        let span_exporter: Arc<dyn Exporter<Span>> = match span_exporter {
            Some(exporter) => exporter,
            None => Arc::new(SpanExporter::new(
                resource.clone(),
                collector_for(SignalKind::Traces)?,
            )?),
        };
        let metric_exporter: Arc<dyn Exporter<MetricPoint>> = match metric_exporter {
            Some(exporter) => exporter,
            None => Arc::new(MetricExporter::new(
                resource.clone(),
                collector_for(SignalKind::Metrics)?,
            )?),
        };
        let log_exporter: Arc<dyn Exporter<LogRecord>> = match log_exporter {
            Some(exporter) => exporter,
            None => Arc::new(LogExporter::new(
                resource.clone(),
                collector_for(SignalKind::Logs)?,
            )?),
        };

        let PipelineConfig {
            traces,
            metrics,
            logs,
            retry,
        } = pipeline;
        let tracer_provider = TracerProvider::new(traces, retry.clone(), span_exporter);
        let meter_provider = MeterProvider::new(metrics, retry.clone(), metric_exporter);
        let logger_provider = LoggerProvider::new(logs, retry, log_exporter);

        tracing::info!(
            service = %resource.service_name(),
            endpoint = collector.as_ref().map(|c| c.endpoint.as_str()),
            "Telemetry providers started"
        );

        Ok(Telemetry {
            resource,
            tracer_provider,
            meter_provider,
            logger_provider,
        })
    }
}

/// Publishes `telemetry` as the process-wide instance.
///
/// # Errors
///
/// Returns [`RegistryError::AlreadyInstalled`] on every call after the first.
/// The rejected instance is dropped, which flushes and stops its providers.
pub fn install(telemetry: Telemetry) -> Result<&'static Telemetry, RegistryError> {
    GLOBAL
        .set(telemetry)
        .map_err(|_rejected| RegistryError::AlreadyInstalled)?;
    GLOBAL.get().ok_or(RegistryError::AlreadyInstalled)
}

/// The installed instance, if any.
#[must_use]
pub fn global() -> Option<&'static Telemetry> {
    GLOBAL.get()
}
