//! otel-demo Telemetry Library
//!
//! Batching providers and OTLP/gRPC exporters for traces, metrics, and logs.
//!
//! # Modules
//!
//! - [`models`] - Span, metric point, and log record types
//! - [`config`] - Batching, retry, and collector settings
//! - [`provider`] - Batching providers and the signal APIs built on them
//! - [`export`] - The exporter seam, OTLP/gRPC exporters, in-memory exporter
//! - [`otlp`] - Encoding records as OTLP protobuf requests
//! - [`context`] - Current span context and `traceparent` propagation
//! - [`registry`] - Assembling providers and the process-wide instance
//! - [`bridge`] - Forwarding `tracing` events to the log pipeline
//! - [`instrumentation`] - Request interception hooks
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use telemetry::export::InMemoryExporter;
//! use telemetry::models::LogLevel;
//! use telemetry::{Resource, Telemetry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let logs = InMemoryExporter::new();
//! let telemetry = Telemetry::builder(Resource::builder("checkout").build())
//!     .with_span_exporter(Arc::new(InMemoryExporter::new()))
//!     .with_metric_exporter(Arc::new(InMemoryExporter::new()))
//!     .with_log_exporter(Arc::new(logs.clone()))
//!     .build()
//!     .unwrap();
//!
//! telemetry.logger_provider().emit(LogLevel::Info, "order placed");
//! assert!(telemetry.shutdown(Duration::from_secs(1)).await);
//! assert_eq!(logs.record_count(), 1);
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod config;
pub mod context;
pub mod export;
pub mod instrumentation;
pub mod models;
pub mod otlp;
pub mod provider;
pub mod registry;
pub mod resource;

pub use provider::{LoggerProvider, MeterProvider, ProviderStats, TracerProvider};
pub use registry::{global, install, Telemetry, TelemetryStats};
pub use resource::Resource;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde_json;
