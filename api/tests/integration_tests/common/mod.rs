//! Common test utilities and helpers for integration tests.
//!
//! This module provides shared functionality used across all integration tests,
//! including test app setup and HTTP request helpers.

#![allow(dead_code)]

pub mod collector;

use api::{create_router, AppState};
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use telemetry::bridge::LogBridgeLayer;
use telemetry::export::InMemoryExporter;
use telemetry::models::{LogRecord, MetricPoint, Span};
use telemetry::{Resource, Telemetry};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

/// Service name used by [`test_app`].
pub const SERVICE_NAME: &str = "otel-demo-test";

/// Router plus handles on everything it exports.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub spans: InMemoryExporter<Span>,
    pub metrics: InMemoryExporter<MetricPoint>,
    pub logs: InMemoryExporter<LogRecord>,
}

impl TestApp {
    /// Flushes every pipeline into the in-memory exporters.
    pub async fn flush(&self) {
        assert!(
            self.state
                .telemetry()
                .force_flush(Duration::from_secs(5))
                .await
        );
    }

    /// Installs a thread-local subscriber that bridges INFO+ events into the
    /// log pipeline, the way `init_tracing` does for the binary.
    pub fn bridge_logs(&self) -> tracing::subscriber::DefaultGuard {
        let bridge = LogBridgeLayer::new(self.state.telemetry().logger_provider().clone())
            .with_filter(LevelFilter::INFO);
        tracing::subscriber::set_default(tracing_subscriber::registry().with(bridge))
    }
}

/// Creates a test router backed by fresh in-memory exporters.
pub fn test_app() -> TestApp {
    let spans = InMemoryExporter::new();
    let metrics = InMemoryExporter::new();
    let logs = InMemoryExporter::new();

    let telemetry = Telemetry::builder(Resource::builder(SERVICE_NAME).build())
        .with_span_exporter(Arc::new(spans.clone()))
        .with_metric_exporter(Arc::new(metrics.clone()))
        .with_log_exporter(Arc::new(logs.clone()))
        .build()
        .unwrap();

    let state = AppState::new(telemetry);
    TestApp {
        router: create_router(state.clone()),
        state,
        spans,
        metrics,
        logs,
    }
}

/// Helper to make a GET request.
///
/// # Returns
///
/// A tuple containing the response status code and parsed JSON response body.
pub async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().method("GET").uri(uri)).await
}

/// Helper to make a GET request carrying a `traceparent` header.
pub async fn get_with_traceparent(app: Router, uri: &str, traceparent: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .method("GET")
            .uri(uri)
            .header("traceparent", traceparent),
    )
    .await
}

async fn send(app: Router, request: axum::http::request::Builder) -> (StatusCode, Value) {
    let response = tower::ServiceExt::oneshot(
        app,
        request
            .header(header::ACCEPT, "application/json")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();

    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
