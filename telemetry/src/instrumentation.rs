//! Request instrumentation hooks.
//!
//! A web framework adapter calls [`RequestInterceptor::before_request`] before
//! the handler and [`RequestInterceptor::after_request`] with the outcome. The
//! scope returned by the first call carries whatever the interceptor needs
//! between the two, and may expose a [`SpanContext`] that the adapter makes
//! current while the handler runs.

use crate::context::SpanContext;
use crate::models::{SpanKind, SpanStatus};
use crate::provider::{ActiveSpan, Counter, Gauge, Histogram, MeterProvider, TracerProvider};
use crate::registry::Telemetry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

/// Counter of completed requests.
pub const REQUEST_COUNT_METRIC: &str = "http.server.request.count";
/// Histogram of request durations in milliseconds.
pub const REQUEST_DURATION_METRIC: &str = "http.server.request.duration";
/// Gauge of in-flight requests.
pub const ACTIVE_REQUESTS_METRIC: &str = "http.server.active_requests";

/// What an interceptor sees of an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Route template if the framework matched one, otherwise the raw path.
    pub route: String,
    /// Raw request path.
    pub path: String,
    /// Value of the incoming `traceparent` header.
    pub traceparent: Option<String>,
}

/// What an interceptor sees of the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseInfo {
    /// HTTP status code.
    pub status: u16,
}

impl ResponseInfo {
    /// Returns true for 5xx responses.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// Hooks around request handling.
pub trait RequestInterceptor: Send + Sync + 'static {
    /// State carried from `before_request` to `after_request`.
    type Scope: Send + 'static;

    /// Called before the handler runs.
    fn before_request(&self, request: &RequestInfo) -> Self::Scope;

    /// Called once the handler produced a response.
    fn after_request(&self, scope: Self::Scope, response: &ResponseInfo);

    /// Context to make current while the handler runs.
    fn span_context(&self, _scope: &Self::Scope) -> Option<SpanContext> {
        None
    }
}

/// Scope of [`TelemetryInterceptor`]: the server span plus timing.
///
/// Dropping it without `after_request` ends the span with an unset status.
#[derive(Debug)]
pub struct RequestScope {
    span: ActiveSpan,
    started: Instant,
    method: String,
    route: String,
    active: Arc<ActiveRequests>,
}

impl RequestScope {
    /// Context of the server span.
    #[must_use]
    pub fn context(&self) -> SpanContext {
        self.span.context()
    }
}

impl Drop for RequestScope {
    fn drop(&mut self) {
        self.active.leave(&self.method, &self.route);
    }
}

/// In-flight request counts, one series per (method, route).
#[derive(Debug)]
struct ActiveRequests {
    counts: Mutex<HashMap<(String, String), i64>>,
    gauge: Gauge,
}

impl ActiveRequests {
    fn enter(&self, method: &str, route: &str) {
        self.adjust(method, route, 1);
    }

    fn leave(&self, method: &str, route: &str) {
        self.adjust(method, route, -1);
    }

    #[allow(clippy::cast_precision_loss)]
    fn adjust(&self, method: &str, route: &str, delta: i64) {
        // Recording under the lock keeps each series' points in order.
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (method.to_string(), route.to_string());
        let now = {
            let count = counts.entry(key.clone()).or_insert(0);
            *count += delta;
            *count
        };
        if now == 0 {
            counts.remove(&key);
        }
        self.gauge.record(
            now as f64,
            &[("http.request.method", method), ("http.route", route)],
        );
    }
}

/// Interceptor that records a server span and request metrics.
///
/// Spans are named `"{METHOD} {route}"` and continue an incoming
/// `traceparent` when one is present. Responses with a 5xx status mark the
/// span as an error; everything else is `Ok`.
#[derive(Debug, Clone)]
pub struct TelemetryInterceptor {
    tracer: TracerProvider,
    requests: Counter,
    duration: Histogram,
    active: Arc<ActiveRequests>,
}

impl TelemetryInterceptor {
    /// Creates an interceptor recording into the given providers.
    #[must_use]
    pub fn new(tracer: TracerProvider, meter: &MeterProvider) -> Self {
        Self {
            tracer,
            requests: meter
                .counter(REQUEST_COUNT_METRIC)
                .with_unit("{request}")
                .with_description("Number of completed HTTP requests"),
            duration: meter
                .histogram(REQUEST_DURATION_METRIC)
                .with_unit("ms")
                .with_description("Duration of HTTP requests"),
            active: Arc::new(ActiveRequests {
                counts: Mutex::new(HashMap::new()),
                gauge: meter
                    .gauge(ACTIVE_REQUESTS_METRIC)
                    .with_unit("{request}")
                    .with_description("Number of in-flight HTTP requests"),
            }),
        }
    }

    /// Creates an interceptor for a [`Telemetry`] instance.
    #[must_use]
    pub fn from_telemetry(telemetry: &Telemetry) -> Self {
        Self::new(telemetry.tracer_provider().clone(), telemetry.meter_provider())
    }
}

impl RequestInterceptor for TelemetryInterceptor {
    type Scope = RequestScope;

    fn before_request(&self, request: &RequestInfo) -> RequestScope {
        let mut builder = self
            .tracer
            .start_span(format!("{} {}", request.method, request.route))
            .with_kind(SpanKind::Server)
            .with_attribute("http.request.method", &request.method)
            .with_attribute("http.route", &request.route)
            .with_attribute("url.path", &request.path);

        if let Some(parent) = request
            .traceparent
            .as_deref()
            .and_then(SpanContext::from_traceparent)
        {
            builder = builder.with_parent(parent);
        }

        self.active.enter(&request.method, &request.route);
        RequestScope {
            span: builder.start(),
            started: Instant::now(),
            method: request.method.clone(),
            route: request.route.clone(),
            active: Arc::clone(&self.active),
        }
    }

    fn after_request(&self, mut scope: RequestScope, response: &ResponseInfo) {
        let status = response.status.to_string();
        let labels = [
            ("http.request.method", scope.method.as_str()),
            ("http.route", scope.route.as_str()),
            ("http.response.status_code", status.as_str()),
        ];
        self.requests.add(1.0, &labels);
        self.duration
            .record(scope.started.elapsed().as_secs_f64() * 1000.0, &labels);

        scope
            .span
            .set_attribute("http.response.status_code", response.status);
        if response.is_server_error() {
            scope
                .span
                .set_status(SpanStatus::Error, Some(format!("HTTP {}", response.status)));
        } else {
            scope.span.set_status(SpanStatus::Ok, None);
        }
    }

    fn span_context(&self, scope: &RequestScope) -> Option<SpanContext> {
        Some(scope.context())
    }
}
