//! Integration tests for the greeting endpoints.
//!
//! Tests cover:
//! - Response bodies
//! - The server span produced per request
//! - Log correlation for `/api/hello`
//! - Request metrics
//! - `traceparent` continuation

use api::{HELLO_LOG_MESSAGE, HELLO_MESSAGE, ROOT_MESSAGE};
use axum::http::StatusCode;
use telemetry::instrumentation::{ACTIVE_REQUESTS_METRIC, REQUEST_COUNT_METRIC, REQUEST_DURATION_METRIC};
use telemetry::models::{LogLevel, SpanKind, SpanStatus};

use super::common::{get, get_with_traceparent, test_app};

#[tokio::test]
async fn test_root_returns_service_message() {
    let app = test_app();

    let (status, response) = get(app.router.clone(), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], ROOT_MESSAGE);
    assert!(response.get("timestamp").is_none());
}

#[tokio::test]
async fn test_hello_returns_message_and_timestamp() {
    let app = test_app();

    let (status, response) = get(app.router.clone(), "/api/hello").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["message"], HELLO_MESSAGE);
    let timestamp = response["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_hello_records_server_span() {
    let app = test_app();

    get(app.router.clone(), "/api/hello").await;
    app.flush().await;

    let spans = app.spans.records();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "GET /api/hello");
    assert_eq!(span.kind, SpanKind::Server);
    assert_eq!(span.status, SpanStatus::Ok);
    assert!(span.parent_span_id.is_none());
    assert_eq!(span.attributes["http.route"], "/api/hello");
    assert_eq!(span.attributes["http.response.status_code"], 200);
}

#[tokio::test]
async fn test_hello_log_is_correlated_with_span() {
    let app = test_app();
    let _guard = app.bridge_logs();

    get(app.router.clone(), "/api/hello").await;
    app.flush().await;

    let logs = app.logs.records();
    assert_eq!(logs.len(), 1);
    let log = &logs[0];
    assert_eq!(log.level, LogLevel::Info);
    assert_eq!(log.message, HELLO_LOG_MESSAGE);

    let spans = app.spans.records();
    assert_eq!(spans.len(), 1);
    assert_eq!(log.trace_id, Some(spans[0].trace_id));
    assert_eq!(log.span_id, Some(spans[0].span_id));
}

#[tokio::test]
async fn test_root_emits_no_logs() {
    let app = test_app();
    let _guard = app.bridge_logs();

    get(app.router.clone(), "/").await;
    app.flush().await;

    assert_eq!(app.logs.record_count(), 0);
    assert_eq!(app.spans.record_count(), 1);
}

#[tokio::test]
async fn test_request_metrics_are_recorded() {
    let app = test_app();

    get(app.router.clone(), "/").await;
    get(app.router.clone(), "/api/hello").await;
    app.flush().await;

    let points = app.metrics.records();
    let count: Vec<_> = points
        .iter()
        .filter(|p| p.name == REQUEST_COUNT_METRIC)
        .collect();
    assert_eq!(count.len(), 2);
    assert!(count.iter().all(|p| p.value == 1.0));
    assert!(count
        .iter()
        .any(|p| p.labels["http.route"] == "/api/hello" && p.labels["http.response.status_code"] == "200"));

    let durations = points
        .iter()
        .filter(|p| p.name == REQUEST_DURATION_METRIC)
        .count();
    assert_eq!(durations, 2);

    let last_active = points
        .iter()
        .filter(|p| p.name == ACTIVE_REQUESTS_METRIC)
        .last()
        .unwrap();
    assert_eq!(last_active.value, 0.0);
}

#[tokio::test]
async fn test_traceparent_is_continued() {
    let app = test_app();
    let traceparent = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    let (status, _) = get_with_traceparent(app.router.clone(), "/api/hello", traceparent).await;
    assert_eq!(status, StatusCode::OK);
    app.flush().await;

    let spans = app.spans.records();
    assert_eq!(spans.len(), 1);
    assert_eq!(
        spans[0].trace_id.to_string(),
        "4bf92f3577b34da6a3ce929d0e0e4736"
    );
    assert_eq!(
        spans[0].parent_span_id.map(|id| id.to_string()).as_deref(),
        Some("00f067aa0ba902b7")
    );
}

#[tokio::test]
async fn test_malformed_traceparent_starts_new_trace() {
    let app = test_app();

    let (status, _) = get_with_traceparent(app.router.clone(), "/", "not-a-traceparent").await;
    assert_eq!(status, StatusCode::OK);
    app.flush().await;

    let spans = app.spans.records();
    assert_eq!(spans.len(), 1);
    assert!(spans[0].parent_span_id.is_none());
    assert!(spans[0].trace_id.is_valid());
}
