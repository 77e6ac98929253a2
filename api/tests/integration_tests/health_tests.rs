//! Integration tests for health check and general API functionality.
//!
//! Tests cover:
//! - Health check endpoint
//! - Pipeline counters reported by the health check

use axum::http::StatusCode;

use super::common::{get, test_app, SERVICE_NAME};

#[tokio::test]
async fn test_health_check() {
    let app = test_app();

    let (status, response) = get(app.router.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "healthy");
    assert_eq!(response["service"], SERVICE_NAME);
}

#[tokio::test]
async fn test_health_reports_pipeline_counters() {
    let app = test_app();

    get(app.router.clone(), "/").await;
    app.flush().await;

    let (_, response) = get(app.router.clone(), "/health").await;
    let traces = &response["telemetry"]["traces"];
    assert_eq!(traces["recorded"], 1);
    assert_eq!(traces["exported"], 1);
    assert_eq!(traces["exported_batches"], 1);
    assert_eq!(traces["dropped"], 0);
    assert_eq!(traces["buffered"], 0);
}
