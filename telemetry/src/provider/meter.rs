//! Metric instruments on top of the batching provider.
//!
//! Instruments do not aggregate. Every `add`/`record` call produces one
//! [`MetricPoint`]; grouping into OTLP metrics happens at export time.

use super::{BatchProvider, ProviderStats};
use crate::config::{BatchConfig, RetryConfig};
use crate::export::Exporter;
use crate::models::{MetricKind, MetricPoint};
use std::sync::Arc;
use std::time::Duration;

/// Creates instruments and hands their points to the metric pipeline.
#[derive(Debug, Clone)]
pub struct MeterProvider {
    inner: Arc<BatchProvider<MetricPoint>>,
}

impl MeterProvider {
    /// Creates the provider and its worker task.
    #[must_use]
    pub fn new(
        config: BatchConfig,
        retry: RetryConfig,
        exporter: Arc<dyn Exporter<MetricPoint>>,
    ) -> Self {
        Self {
            inner: Arc::new(
                BatchProvider::new(config, retry, exporter)
                    .with_validation(|point| point.validate_metric().map_err(|e| e.to_string())),
            ),
        }
    }

    /// A monotonic counter.
    #[must_use]
    pub fn counter(&self, name: impl Into<String>) -> Counter {
        Counter(self.instrument(name, MetricKind::Counter))
    }

    /// A gauge reporting the latest value.
    #[must_use]
    pub fn gauge(&self, name: impl Into<String>) -> Gauge {
        Gauge(self.instrument(name, MetricKind::Gauge))
    }

    /// A histogram of observations.
    #[must_use]
    pub fn histogram(&self, name: impl Into<String>) -> Histogram {
        Histogram(self.instrument(name, MetricKind::Histogram))
    }

    /// Records a fully built point.
    pub fn record(&self, point: MetricPoint) {
        self.inner.record(point);
    }

    /// See [`BatchProvider::force_flush`].
    pub async fn force_flush(&self, timeout: Duration) -> bool {
        self.inner.force_flush(timeout).await
    }

    /// See [`BatchProvider::shutdown`].
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.inner.shutdown(timeout).await
    }

    /// Current pipeline counters.
    #[must_use]
    pub fn stats(&self) -> ProviderStats {
        self.inner.stats()
    }

    fn instrument(&self, name: impl Into<String>, kind: MetricKind) -> Instrument {
        Instrument {
            provider: self.clone(),
            name: name.into(),
            kind,
            unit: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Instrument {
    provider: MeterProvider,
    name: String,
    kind: MetricKind,
    unit: Option<String>,
    description: Option<String>,
}

impl Instrument {
    fn emit(&self, value: f64, labels: &[(&str, &str)]) {
        let mut point = MetricPoint::new(self.name.clone(), self.kind, value);
        point.unit.clone_from(&self.unit);
        point.description.clone_from(&self.description);
        for (key, value) in labels {
            point.labels.insert((*key).to_string(), (*value).to_string());
        }
        self.provider.record(point);
    }
}

macro_rules! instrument_setters {
    ($name:ident) => {
        impl $name {
            /// Sets the unit reported with every point.
            #[must_use]
            pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
                self.0.unit = Some(unit.into());
                self
            }

            /// Sets the description reported with every point.
            #[must_use]
            pub fn with_description(mut self, description: impl Into<String>) -> Self {
                self.0.description = Some(description.into());
                self
            }

            /// The instrument name.
            #[must_use]
            pub fn name(&self) -> &str {
                &self.0.name
            }
        }
    };
}

/// Monotonic counter.
#[derive(Debug, Clone)]
pub struct Counter(Instrument);

/// Latest-value gauge.
#[derive(Debug, Clone)]
pub struct Gauge(Instrument);

/// Distribution of observations.
#[derive(Debug, Clone)]
pub struct Histogram(Instrument);

instrument_setters!(Counter);
instrument_setters!(Gauge);
instrument_setters!(Histogram);

impl Counter {
    /// Adds `value`. Negative increments are ignored.
    pub fn add(&self, value: f64, labels: &[(&str, &str)]) {
        if value < 0.0 {
            tracing::debug!(instrument = %self.0.name, value, "Ignoring negative counter increment");
            return;
        }
        self.0.emit(value, labels);
    }
}

impl Gauge {
    /// Reports the current value.
    pub fn record(&self, value: f64, labels: &[(&str, &str)]) {
        self.0.emit(value, labels);
    }
}

impl Histogram {
    /// Records one observation.
    pub fn record(&self, value: f64, labels: &[(&str, &str)]) {
        self.0.emit(value, labels);
    }
}
