//! Signal providers.
//!
//! Each provider owns one [`BatchProvider`] and a background worker that
//! exports its records. The typed wrappers add the signal-specific API.

pub mod batch;
pub mod logger;
pub mod meter;
pub mod tracer;

pub use batch::{BatchProvider, ProviderStats};
pub use logger::LoggerProvider;
pub use meter::{Counter, Gauge, Histogram, MeterProvider};
pub use tracer::{ActiveSpan, SpanBuilder, TracerProvider};
