//! Log record emission on top of the batching provider.

use super::{BatchProvider, ProviderStats};
use crate::config::{BatchConfig, RetryConfig};
use crate::context;
use crate::export::Exporter;
use crate::models::{LogLevel, LogRecord};
use std::sync::Arc;
use std::time::Duration;

/// Accepts log records and hands them to the log pipeline.
#[derive(Debug, Clone)]
pub struct LoggerProvider {
    inner: Arc<BatchProvider<LogRecord>>,
}

impl LoggerProvider {
    /// Creates the provider and its worker task.
    #[must_use]
    pub fn new(
        config: BatchConfig,
        retry: RetryConfig,
        exporter: Arc<dyn Exporter<LogRecord>>,
    ) -> Self {
        Self {
            inner: Arc::new(
                BatchProvider::new(config, retry, exporter)
                    .with_validation(|record| record.validate_record().map_err(|e| e.to_string())),
            ),
        }
    }

    /// Emits a message at the given level.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>) {
        self.emit_record(LogRecord::new(level, message));
    }

    /// Emits a prepared record.
    ///
    /// Records without trace ids pick them up from the current span context.
    pub fn emit_record(&self, mut record: LogRecord) {
        if record.trace_id.is_none() {
            if let Some(current) = context::current() {
                record.trace_id = Some(current.trace_id);
                record.span_id = Some(current.span_id);
            }
        }
        self.inner.record(record);
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
}
