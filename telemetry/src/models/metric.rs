//! Metric data model.
//!
//! Defines the `MetricPoint` record: a single timestamped observation of a
//! named instrument.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Kind of instrument a metric point was recorded by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// A monotonic counter; each point is an increment.
    Counter,
    /// A gauge that can go up or down; each point is the current value.
    #[default]
    Gauge,
    /// A distribution; each point is one observation.
    Histogram,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Counter => write!(f, "counter"),
            Self::Gauge => write!(f, "gauge"),
            Self::Histogram => write!(f, "histogram"),
        }
    }
}

/// A metric data point representing a single measurement.
///
/// # Example
///
/// ```
/// use telemetry::models::{MetricKind, MetricPoint};
///
/// let point = MetricPoint::counter("http.server.request.count", 1.0)
///     .with_label("http.request.method", "GET")
///     .with_label("http.route", "/api/hello");
///
/// assert_eq!(point.kind, MetricKind::Counter);
/// assert!(point.validate_metric().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MetricPoint {
    /// The name of the instrument (e.g., "`http.server.request.duration`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// The kind of instrument.
    pub kind: MetricKind,

    /// The observed value.
    pub value: f64,

    /// Timestamp when the value was observed.
    pub timestamp: DateTime<Utc>,

    /// Labels (dimensions) for the point.
    #[serde(default)]
    pub labels: HashMap<String, String>,

    /// Optional description of the instrument.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Optional unit of the instrument (e.g., "ms", "By").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Errors that can occur during metric validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// The value is NaN or infinite.
    #[error("Metric value must be finite, got {0}")]
    NonFiniteValue(f64),

    /// A counter increment was negative.
    #[error("Counter increment cannot be negative, got {0}")]
    NegativeCounter(f64),

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricPoint {
    /// Creates a new metric point with the current timestamp.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MetricKind, value: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            value,
            timestamp: Utc::now(),
            labels: HashMap::new(),
            description: None,
            unit: None,
        }
    }

    /// Creates a counter increment.
    #[must_use]
    pub fn counter(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Counter, value)
    }

    /// Creates a gauge observation.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Gauge, value)
    }

    /// Creates a histogram observation.
    #[must_use]
    pub fn histogram(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricKind::Histogram, value)
    }

    /// Adds a label to the point.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the description of the instrument.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the unit of the instrument.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Sets the timestamp of the point.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Validates the point.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name is empty
    /// - The value is not finite
    /// - A counter increment is negative
    pub fn validate_metric(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }
        if !self.value.is_finite() {
            return Err(MetricValidationError::NonFiniteValue(self.value));
        }
        if self.kind == MetricKind::Counter && self.value < 0.0 {
            return Err(MetricValidationError::NegativeCounter(self.value));
        }
        self.validate()?;
        Ok(())
    }
}
