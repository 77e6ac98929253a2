//! Span creation on top of the batching provider.

use super::{BatchProvider, ProviderStats};
use crate::config::{BatchConfig, RetryConfig};
use crate::context::{self, SpanContext};
use crate::export::Exporter;
use crate::models::{Span, SpanId, SpanKind, SpanStatus, TraceId};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Creates spans and hands finished ones to the trace pipeline.
#[derive(Debug, Clone)]
pub struct TracerProvider {
    inner: Arc<BatchProvider<Span>>,
}

impl TracerProvider {
    /// Creates the provider and its worker task.
    #[must_use]
    pub fn new(config: BatchConfig, retry: RetryConfig, exporter: Arc<dyn Exporter<Span>>) -> Self {
        Self {
            inner: Arc::new(
                BatchProvider::new(config, retry, exporter)
                    .with_validation(|span| span.validate_span().map_err(|e| e.to_string())),
            ),
        }
    }

    /// Starts building a span.
    ///
    /// Unless a parent is set explicitly, the span becomes a child of the
    /// current context, or the root of a new trace when there is none.
    #[must_use]
    pub fn start_span(&self, name: impl Into<String>) -> SpanBuilder {
        SpanBuilder {
            provider: self.clone(),
            name: name.into(),
            kind: SpanKind::Internal,
            parent: None,
            attributes: HashMap::new(),
        }
    }

    /// Records an already finished span.
    pub fn record(&self, span: Span) {
        self.inner.record(span);
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

/// Configures a span before it starts.
#[derive(Debug)]
#[must_use = "a span builder does nothing until started"]
pub struct SpanBuilder {
    provider: TracerProvider,
    name: String,
    kind: SpanKind,
    parent: Option<SpanContext>,
    attributes: HashMap<String, serde_json::Value>,
}

impl SpanBuilder {
    /// Sets the span kind.
    pub fn with_kind(mut self, kind: SpanKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the parent explicitly.
    pub fn with_parent(mut self, parent: SpanContext) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Adds an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
        self.attributes.insert(key.into(), value);
        self
    }

    /// Starts the span now.
    pub fn start(self) -> ActiveSpan {
        let parent = self.parent.or_else(context::current);
        let trace_id = parent.map_or_else(TraceId::random, |p| p.trace_id);
        let span_id = SpanId::random();

        let mut span = Span::new(trace_id, span_id, self.name).with_kind(self.kind);
        span.attributes = self.attributes;
        if let Some(parent) = parent {
            span = span.with_parent(parent.span_id);
        }

        ActiveSpan {
            context: SpanContext {
                trace_id,
                span_id,
                sampled: parent.is_none_or(|p| p.sampled),
                remote: false,
            },
            provider: self.provider,
            span: Some(span),
        }
    }
}

/// A started span. Ends on [`end`](Self::end) or when dropped.
#[derive(Debug)]
pub struct ActiveSpan {
    provider: TracerProvider,
    context: SpanContext,
    span: Option<Span>,
}

impl ActiveSpan {
    /// Identity of this span, for children and propagation.
    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.context
    }

    /// Adds or replaces an attribute.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Serialize) {
        if let Some(span) = self.span.as_mut() {
            let value = serde_json::to_value(value).unwrap_or(serde_json::Value::Null);
            span.attributes.insert(key.into(), value);
        }
    }

    /// Sets the final status.
    pub fn set_status(&mut self, status: SpanStatus, message: Option<String>) {
        if let Some(span) = self.span.as_mut() {
            span.status = status;
            span.status_message = message;
        }
    }

    /// Ends the span and records it.
    pub fn end(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        if let Some(mut span) = self.span.take() {
            span.end_time = Utc::now().max(span.start_time);
            self.provider.record(span);
        }
    }
}

impl Drop for ActiveSpan {
    fn drop(&mut self) {
        self.finish();
    }
}
