//! Active span context and W3C `traceparent` propagation.
//!
//! The current context lives in a tokio task-local. Code running inside
//! [`scope`] sees it through [`current`], which is how log records pick up
//! trace correlation and new spans find their parent.

use crate::models::{SpanId, TraceId};
use std::future::Future;

/// Name of the W3C trace context request header.
pub const TRACEPARENT_HEADER: &str = "traceparent";

const TRACEPARENT_VERSION: &str = "00";
const FLAG_SAMPLED: u8 = 0x01;

tokio::task_local! {
    static CURRENT: SpanContext;
}

/// Identity of a span, as seen by its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanContext {
    /// Trace the span belongs to.
    pub trace_id: TraceId,
    /// The span itself.
    pub span_id: SpanId,
    /// Whether the upstream caller sampled this trace.
    pub sampled: bool,
    /// True if the context was received from another process.
    pub remote: bool,
}

impl SpanContext {
    /// Creates a local, sampled context.
    #[must_use]
    pub fn new(trace_id: TraceId, span_id: SpanId) -> Self {
        Self {
            trace_id,
            span_id,
            sampled: true,
            remote: false,
        }
    }

    /// Returns true if both ids are non-zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.trace_id.is_valid() && self.span_id.is_valid()
    }

    /// Parses a `traceparent` header value.
    ///
    /// Returns `None` for anything malformed, including all-zero ids and the
    /// forbidden version `ff`. Unknown future versions are accepted if the
    /// first four fields parse.
    #[must_use]
    pub fn from_traceparent(header: &str) -> Option<Self> {
        let mut parts = header.trim().split('-');
        let version = parts.next()?;
        let trace_id = parts.next()?;
        let span_id = parts.next()?;
        let flags = parts.next()?;

        if version.len() != 2 || !is_lower_hex(version) || version == "ff" {
            return None;
        }
        if version == TRACEPARENT_VERSION && parts.next().is_some() {
            return None;
        }
        if !is_lower_hex(trace_id) || !is_lower_hex(span_id) || flags.len() != 2 || !is_lower_hex(flags) {
            return None;
        }

        let context = Self {
            trace_id: TraceId::from_hex(trace_id).ok()?,
            span_id: SpanId::from_hex(span_id).ok()?,
            sampled: u8::from_str_radix(flags, 16).ok()? & FLAG_SAMPLED != 0,
            remote: true,
        };
        context.is_valid().then_some(context)
    }

    /// Formats the context as a `traceparent` header value.
    #[must_use]
    pub fn to_traceparent(&self) -> String {
        let flags = if self.sampled { FLAG_SAMPLED } else { 0 };
        format!(
            "{TRACEPARENT_VERSION}-{}-{}-{flags:02x}",
            self.trace_id, self.span_id
        )
    }
}

fn is_lower_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Returns the context of the innermost enclosing [`scope`], if any.
#[must_use]
pub fn current() -> Option<SpanContext> {
    CURRENT.try_with(|context| *context).ok()
}

/// Runs `future` with `context` as the current span context.
pub async fn scope<F>(context: SpanContext, future: F) -> F::Output
where
    F: Future,
{
    CURRENT.scope(context, future).await
}

/// Runs `f` synchronously with `context` as the current span context.
pub fn sync_scope<R>(context: SpanContext, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(context, f)
}
