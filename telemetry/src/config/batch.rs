//! Batching and retry configuration for signal providers.
//!
//! Each signal kind (traces, metrics, logs) gets its own `BatchConfig`; the
//! retry policy is shared by all three exporters.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The three signal kinds handled by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Distributed traces (spans)
    Traces,
    /// Metric points (counters, gauges, histograms)
    Metrics,
    /// Log records
    Logs,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Traces => write!(f, "traces"),
            Self::Metrics => write!(f, "metrics"),
            Self::Logs => write!(f, "logs"),
        }
    }
}

/// What to do with a new record when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Discard the incoming record.
    #[default]
    DropNewest,
    /// Evict the oldest buffered record to make room.
    DropOldest,
}

/// Errors raised by configuration validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Batch size must be at least one.
    #[error("{0}: max batch size must be greater than zero")]
    ZeroBatchSize(SignalKind),

    /// Queue size must be at least one.
    #[error("{0}: max queue size must be greater than zero")]
    ZeroQueueSize(SignalKind),

    /// Queue must be able to hold one full batch.
    #[error("{kind}: max queue size {queue} is smaller than max batch size {batch}")]
    QueueSmallerThanBatch {
        /// Signal kind the config applies to.
        kind: SignalKind,
        /// Configured queue size.
        queue: usize,
        /// Configured batch size.
        batch: usize,
    },

    /// The retry policy must allow at least one attempt.
    #[error("retry policy must allow at least one attempt")]
    ZeroAttempts,

    /// The collector endpoint is missing or unusable.
    #[error("invalid collector endpoint '{0}'")]
    InvalidEndpoint(String),
}

/// Buffering policy of one signal provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Signal kind this policy applies to.
    pub kind: SignalKind,
    /// Records per exported batch; reaching it triggers an immediate flush.
    pub max_batch_size: usize,
    /// Longest time a record waits in an otherwise idle buffer.
    pub max_delay: Duration,
    /// Buffer capacity; records beyond it are dropped per `overflow`.
    pub max_queue_size: usize,
    /// Overflow handling.
    #[serde(default)]
    pub overflow: OverflowPolicy,
}

impl BatchConfig {
    /// Default records per batch.
    pub const DEFAULT_MAX_BATCH_SIZE: usize = 512;
    /// Default buffer capacity.
    pub const DEFAULT_MAX_QUEUE_SIZE: usize = 2048;

    /// Creates a config with the default sizes and the given delay.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use telemetry::config::{BatchConfig, SignalKind};
    ///
    /// let config = BatchConfig::new(SignalKind::Traces, Duration::from_secs(5));
    /// assert_eq!(config.max_batch_size, 512);
    /// assert!(config.validate().is_ok());
    /// ```
    #[must_use]
    pub fn new(kind: SignalKind, max_delay: Duration) -> Self {
        Self {
            kind,
            max_batch_size: Self::DEFAULT_MAX_BATCH_SIZE,
            max_delay,
            max_queue_size: Self::DEFAULT_MAX_QUEUE_SIZE,
            overflow: OverflowPolicy::default(),
        }
    }

    /// Defaults for traces: 5 second delay.
    #[must_use]
    pub fn traces() -> Self {
        Self::new(SignalKind::Traces, Duration::from_secs(5))
    }

    /// Defaults for metrics: 60 second delay.
    #[must_use]
    pub fn metrics() -> Self {
        Self::new(SignalKind::Metrics, Duration::from_secs(60))
    }

    /// Defaults for logs: 1 second delay.
    #[must_use]
    pub fn logs() -> Self {
        Self::new(SignalKind::Logs, Duration::from_secs(1))
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Sets the flush delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the buffer capacity.
    #[must_use]
    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    /// Sets the overflow policy.
    #[must_use]
    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Batch size or queue size is zero
    /// - The queue cannot hold one full batch
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize(self.kind));
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueueSize(self.kind));
        }
        if self.max_queue_size < self.max_batch_size {
            return Err(ConfigError::QueueSmallerThanBatch {
                kind: self.kind,
                queue: self.max_queue_size,
                batch: self.max_batch_size,
            });
        }
        Ok(())
    }
}

/// Bounded exponential backoff applied to retryable export failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per batch, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_backoff: Duration,
    /// Upper bound for any single delay.
    pub max_backoff: Duration,
}

impl RetryConfig {
    /// Returns the delay to wait after the given failed attempt (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use telemetry::config::RetryConfig;
    ///
    /// let retry = RetryConfig::default();
    /// assert_eq!(retry.backoff_for(1), Duration::from_millis(50));
    /// assert_eq!(retry.backoff_for(2), Duration::from_millis(100));
    /// ```
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// A policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if no attempt is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

/// Complete buffering configuration for all three providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Policy for the trace provider.
    pub traces: BatchConfig,
    /// Policy for the metric provider.
    pub metrics: BatchConfig,
    /// Policy for the log provider.
    pub logs: BatchConfig,
    /// Retry policy shared by the exporters.
    pub retry: RetryConfig,
}

impl PipelineConfig {
    /// Gets the batch policy for a signal kind.
    #[must_use]
    pub fn get(&self, kind: SignalKind) -> &BatchConfig {
        match kind {
            SignalKind::Traces => &self.traces,
            SignalKind::Metrics => &self.metrics,
            SignalKind::Logs => &self.logs,
        }
    }

    /// Validates every policy.
    ///
    /// # Errors
    ///
    /// Returns the first invalid policy found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.traces.validate()?;
        self.metrics.validate()?;
        self.logs.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            traces: BatchConfig::traces(),
            metrics: BatchConfig::metrics(),
            logs: BatchConfig::logs(),
            retry: RetryConfig::default(),
        }
    }
}
