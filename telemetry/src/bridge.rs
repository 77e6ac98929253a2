//! Bridge from `tracing` events to the log pipeline.

use crate::models::{LogLevel, LogRecord};
use crate::provider::LoggerProvider;
use std::collections::HashMap;
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Targets whose events are never forwarded. Exporting them would feed the
/// pipeline with records about its own exports.
pub const DEFAULT_IGNORED_TARGETS: &[&str] = &[
    "telemetry",
    "tonic",
    "h2",
    "hyper",
    "hyper_util",
    "tower",
];

/// Attribute carrying the `tracing` target of a bridged event.
pub const TARGET_ATTRIBUTE: &str = "code.namespace";

/// A [`Layer`] that turns `tracing` events into [`LogRecord`]s.
///
/// Combine with a level filter to limit what is exported:
///
/// ```no_run
/// # async fn example(logger: telemetry::LoggerProvider) {
/// use telemetry::bridge::LogBridgeLayer;
/// use tracing_subscriber::{filter::LevelFilter, prelude::*};
///
/// tracing_subscriber::registry()
///     .with(LogBridgeLayer::new(logger).with_filter(LevelFilter::INFO))
///     .init();
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LogBridgeLayer {
    provider: LoggerProvider,
    ignored: Vec<String>,
}

impl LogBridgeLayer {
    /// Creates a layer that ignores [`DEFAULT_IGNORED_TARGETS`].
    #[must_use]
    pub fn new(provider: LoggerProvider) -> Self {
        Self {
            provider,
            ignored: DEFAULT_IGNORED_TARGETS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Also ignores events whose target is `target` or a child module of it.
    #[must_use]
    pub fn ignore_target(mut self, target: impl Into<String>) -> Self {
        self.ignored.push(target.into());
        self
    }

    fn is_ignored(&self, target: &str) -> bool {
        self.ignored.iter().any(|ignored| {
            target
                .strip_prefix(ignored.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
        })
    }
}

impl<S> Layer<S> for LogBridgeLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if self.is_ignored(metadata.target()) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| metadata.name().to_string());
        let mut record = LogRecord::new(LogLevel::from(*metadata.level()), message);
        record.attributes = visitor.attributes;
        record
            .attributes
            .insert(TARGET_ATTRIBUTE.to_string(), metadata.target().into());

        self.provider.emit_record(record);
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    attributes: HashMap<String, serde_json::Value>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.attributes.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}").into());
    }
}
