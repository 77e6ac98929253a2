//! OpenTelemetry Protocol (OTLP) support.
//!
//! This module encodes internal signal records into OTLP protobuf requests.
//! The generated protobuf and gRPC types come from the `opentelemetry-proto`
//! crate and are re-exported as [`proto`].
//!
//! # Example
//!
//! ```
//! use telemetry::models::{LogLevel, LogRecord};
//! use telemetry::otlp::conversions::logs_to_request;
//! use telemetry::Resource;
//!
//! let resource = Resource::builder("demo").build();
//! let request = logs_to_request(&resource, &[LogRecord::new(LogLevel::Info, "hi")]);
//! assert_eq!(request.resource_logs[0].scope_logs[0].log_records.len(), 1);
//! ```

pub mod conversions;

/// Generated protobuf and gRPC types from the OTLP definitions.
pub use opentelemetry_proto::tonic as proto;
