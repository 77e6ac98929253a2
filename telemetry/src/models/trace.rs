//! Trace and span data models.
//!
//! Defines the identifiers and the finished `Span` record handed to the
//! trace pipeline.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use validator::Validate;

/// Error returned when parsing a hex-encoded identifier fails.
#[derive(Debug, Error, PartialEq)]
pub enum IdParseError {
    /// The input has the wrong number of hex digits.
    #[error("expected {expected} hex digits, got {actual}")]
    InvalidLength {
        /// Expected number of hex digits.
        expected: usize,
        /// Actual number of characters.
        actual: usize,
    },

    /// The input contains a non-hex character.
    #[error("invalid hex identifier: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

macro_rules! hex_id {
    ($name:ident, $len:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(into = "String", try_from = "String")]
        pub struct $name([u8; $len]);

        impl $name {
            /// The all-zero identifier, which is never valid on the wire.
            pub const INVALID: Self = Self([0; $len]);

            /// Creates an identifier from raw bytes.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Generates a new random, non-zero identifier.
            #[must_use]
            pub fn random() -> Self {
                loop {
                    let bytes: [u8; $len] = rand::random();
                    if bytes != [0; $len] {
                        return Self(bytes);
                    }
                }
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn to_bytes(self) -> [u8; $len] {
                self.0
            }

            /// Returns true unless every byte is zero.
            #[must_use]
            pub fn is_valid(&self) -> bool {
                self.0 != [0; $len]
            }

            /// Parses a lowercase or uppercase hex string.
            ///
            /// # Errors
            ///
            /// Returns an error if the string is not exactly the right number
            /// of hex digits.
            pub fn from_hex(s: &str) -> Result<Self, IdParseError> {
                if s.len() != $len * 2 {
                    return Err(IdParseError::InvalidLength {
                        expected: $len * 2,
                        actual: s.len(),
                    });
                }
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(s, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::from_hex(&s)
            }
        }
    };
}

hex_id!(TraceId, 16, "A 16-byte trace identifier, rendered as 32 hex digits.");
hex_id!(SpanId, 8, "An 8-byte span identifier, rendered as 16 hex digits.");

/// Status code for a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// No status was set.
    #[default]
    Unset,
    /// The operation completed successfully.
    Ok,
    /// The operation failed.
    Error,
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Kind of span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// Default span kind (internal operation).
    #[default]
    Internal,
    /// The span represents a server handling a request.
    Server,
    /// The span represents a client making a request.
    Client,
    /// The span represents a producer sending a message.
    Producer,
    /// The span represents a consumer receiving a message.
    Consumer,
}

impl fmt::Display for SpanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "internal"),
            Self::Server => write!(f, "server"),
            Self::Client => write!(f, "client"),
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

/// A finished span: one timed unit of work within a trace.
///
/// # Example
///
/// ```
/// use telemetry::models::{Span, SpanId, SpanKind, SpanStatus, TraceId};
///
/// let span = Span::new(TraceId::random(), SpanId::random(), "GET /api/hello")
///     .with_kind(SpanKind::Server)
///     .with_status(SpanStatus::Ok)
///     .with_attribute("http.response.status_code", 200);
///
/// assert!(span.validate_span().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Span {
    /// Identifier of the trace this span belongs to.
    pub trace_id: TraceId,

    /// Identifier of this span.
    pub span_id: SpanId,

    /// The parent span ID (None for root spans).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<SpanId>,

    /// The name/operation of this span.
    #[validate(length(min = 1, message = "Span name cannot be empty"))]
    pub name: String,

    /// The kind of span.
    #[serde(default)]
    pub kind: SpanKind,

    /// The status of the span.
    #[serde(default)]
    pub status: SpanStatus,

    /// Optional description accompanying an error status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,

    /// Timestamp when the span started.
    pub start_time: DateTime<Utc>,

    /// Timestamp when the span ended.
    pub end_time: DateTime<Utc>,

    /// Additional attributes for the span.
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

/// Errors that can occur during span validation.
#[derive(Debug, Error)]
pub enum SpanValidationError {
    /// The trace ID is all zeroes.
    #[error("Trace ID cannot be all zeroes")]
    InvalidTraceId,

    /// The span ID is all zeroes.
    #[error("Span ID cannot be all zeroes")]
    InvalidSpanId,

    /// The span name is empty.
    #[error("Span name cannot be empty")]
    EmptyName,

    /// The end time is before the start time.
    #[error("End time cannot be before start time")]
    InvalidTimeRange,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl Span {
    /// Creates a new span with the current time as both start and end.
    #[must_use]
    pub fn new(trace_id: TraceId, span_id: SpanId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            trace_id,
            span_id,
            parent_span_id: None,
            name: name.into(),
            kind: SpanKind::default(),
            status: SpanStatus::default(),
            status_message: None,
            start_time: now,
            end_time: now,
            attributes: HashMap::new(),
        }
    }

    /// Sets the parent span ID.
    #[must_use]
    pub fn with_parent(mut self, parent_span_id: SpanId) -> Self {
        self.parent_span_id = Some(parent_span_id);
        self
    }

    /// Sets the span kind.
    #[must_use]
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the span status.
    #[must_use]
    pub fn with_status(mut self, status: SpanStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the start time.
    #[must_use]
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = end_time;
        self
    }

    /// Adds an attribute to the span.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        self.attributes.insert(
            key.into(),
            serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        );
        self
    }

    /// Returns the duration of the span.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Returns true if this is a root span (no parent).
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_span_id.is_none()
    }

    /// Validates the span.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The trace ID or span ID is all zeroes
    /// - The name is empty
    /// - The end time is before the start time
    pub fn validate_span(&self) -> Result<(), SpanValidationError> {
        if !self.trace_id.is_valid() {
            return Err(SpanValidationError::InvalidTraceId);
        }
        if !self.span_id.is_valid() {
            return Err(SpanValidationError::InvalidSpanId);
        }
        if self.name.is_empty() {
            return Err(SpanValidationError::EmptyName);
        }
        if self.end_time < self.start_time {
            return Err(SpanValidationError::InvalidTimeRange);
        }
        self.validate()?;
        Ok(())
    }
}
