//! Signal record models.
//!
//! This module contains the three record kinds flowing through the pipeline:
//! spans, metric points, and log records.

pub mod log;
pub mod metric;
pub mod trace;

pub use log::{LogLevel, LogRecord, LogValidationError};
pub use metric::{MetricKind, MetricPoint, MetricValidationError};
pub use trace::{IdParseError, Span, SpanId, SpanKind, SpanStatus, SpanValidationError, TraceId};
