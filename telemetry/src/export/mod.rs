//! Exporters: hand finished batches to a destination.
//!
//! The [`Exporter`] trait is the seam between the batching providers and the
//! transport. The OTLP exporters ([`SpanExporter`], [`MetricExporter`],
//! [`LogExporter`]) share the lazily connected [`OtlpChannel`];
//! [`InMemoryExporter`] keeps batches in memory for tests and development.

pub mod channel;
pub mod logs;
pub mod memory;
pub mod metrics;
pub mod trace;

pub use channel::OtlpChannel;
pub use logs::LogExporter;
pub use memory::InMemoryExporter;
pub use metrics::MetricExporter;
pub use trace::SpanExporter;

use std::fmt::Display;
use thiserror::Error;
use tonic::Code;

/// Errors that can occur while exporting a batch.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The collector endpoint could not be parsed or configured.
    #[error("invalid collector endpoint '{endpoint}'")]
    InvalidEndpoint {
        /// The configured endpoint.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: tonic::transport::Error,
    },

    /// Connecting to the collector failed.
    #[error("failed to connect to collector at {endpoint}")]
    Connect {
        /// The configured endpoint.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: tonic::transport::Error,
    },

    /// The collector answered with a gRPC error status.
    #[error("collector returned {}: {}", .0.code(), .0.message())]
    Rpc(#[from] tonic::Status),

    /// The collector accepted the request but rejected some records.
    #[error("collector rejected {rejected} records: {message}")]
    Rejected {
        /// Number of rejected records.
        rejected: i64,
        /// Message from the collector.
        message: String,
    },

    /// A record in the batch failed validation.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}

impl ExportError {
    /// Returns true if retrying the same batch may succeed.
    ///
    /// Follows the OTLP/gRPC guidance: transport failures and transient status
    /// codes are retryable, everything else is permanent.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect { .. } => true,
            Self::Rpc(status) => is_retryable_code(status.code()),
            Self::InvalidEndpoint { .. } | Self::Rejected { .. } | Self::InvalidBatch(_) => false,
        }
    }
}

/// Returns true for gRPC codes that indicate a transient failure.
#[must_use]
pub fn is_retryable_code(code: Code) -> bool {
    matches!(
        code,
        Code::Cancelled
            | Code::DeadlineExceeded
            | Code::ResourceExhausted
            | Code::Aborted
            | Code::OutOfRange
            | Code::Unavailable
            | Code::DataLoss
    )
}

/// Destination for batches of one record kind.
///
/// Implementations must not keep the batch; the caller drops it once the
/// final outcome is known.
#[tonic::async_trait]
pub trait Exporter<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Sends one batch.
    ///
    /// # Errors
    ///
    /// Returns an error classified by [`ExportError::is_retryable`].
    async fn export(&self, batch: &[T]) -> Result<(), ExportError>;

    /// Releases transport resources. Called once, after the final flush.
    async fn shutdown(&self) {}
}

/// Validates every record, reporting the first failure.
pub(crate) fn validate_batch<T, E, F>(batch: &[T], validate: F) -> Result<(), ExportError>
where
    E: Display,
    F: Fn(&T) -> Result<(), E>,
{
    for (index, record) in batch.iter().enumerate() {
        validate(record).map_err(|e| ExportError::InvalidBatch(format!("record {index}: {e}")))?;
    }
    Ok(())
}

/// Interprets the `partial_success` part of an export response.
pub(crate) fn check_partial_success(rejected: i64, message: String) -> Result<(), ExportError> {
    if rejected > 0 {
        return Err(ExportError::Rejected { rejected, message });
    }
    if !message.is_empty() {
        tracing::warn!(message = %message, "Collector reported a warning");
    }
    Ok(())
}
