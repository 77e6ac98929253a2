//! End-to-end export tests against an in-process OTLP collector.
//!
//! Tests cover:
//! - Spans, metrics, and logs reaching the collector over gRPC
//! - Resource attributes on exported requests
//! - Serving requests while the collector is unreachable
//! - TLS mode against a plain-text collector
//! - Malformed records dropped without their batch

use api::{create_router, AppState, HELLO_LOG_MESSAGE};
use axum::http::StatusCode;
use std::time::Duration;
use telemetry::bridge::LogBridgeLayer;
use telemetry::config::{ExporterConfig, PipelineConfig, RetryConfig, Security, TelemetryConfig};
use telemetry::export::{Exporter, LogExporter};
use telemetry::models::{LogLevel, LogRecord};
use telemetry::otlp::proto::metrics::v1::metric::Data;
use telemetry::otlp::proto::common::v1::any_value::Value as AnyValue;
use telemetry::otlp::proto::common::v1::KeyValue;
use telemetry::registry::TelemetryBuilder;
use telemetry::{Resource, Telemetry};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use super::common::collector::MockCollector;
use super::common::get;

const SERVICE_NAME: &str = "otel-demo-export-test";

fn telemetry_for(endpoint: &str, retry: RetryConfig) -> Telemetry {
    let config = TelemetryConfig {
        pipeline: PipelineConfig {
            retry,
            ..PipelineConfig::default()
        },
        collector: ExporterConfig::new(endpoint).with_timeout(Duration::from_secs(2)),
    };
    TelemetryBuilder::from_config(
        Resource::builder(SERVICE_NAME)
            .with_service_version("9.9.9")
            .build(),
        config,
    )
    .build()
    .unwrap()
}

fn string_attr<'a>(attributes: &'a [KeyValue], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|kv| kv.key == key)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| match &v.value {
            Some(AnyValue::StringValue(s)) => Some(s.as_str()),
            _ => None,
        })
}

#[tokio::test]
async fn test_signals_reach_collector() {
    let collector = MockCollector::start().await;
    let telemetry = telemetry_for(&collector.endpoint(), RetryConfig::default());
    let router = create_router(AppState::new(telemetry.clone()));

    let bridge =
        LogBridgeLayer::new(telemetry.logger_provider().clone()).with_filter(LevelFilter::INFO);
    let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(bridge));

    let (status, _) = get(router.clone(), "/api/hello").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = get(router, "/").await;
    assert_eq!(status, StatusCode::OK);

    assert!(telemetry.shutdown(Duration::from_secs(10)).await);

    let traces = collector.trace_requests();
    let spans: Vec<_> = traces
        .iter()
        .flat_map(|r| &r.resource_spans)
        .flat_map(|rs| &rs.scope_spans)
        .flat_map(|ss| &ss.spans)
        .collect();
    assert_eq!(spans.len(), 2);
    assert!(spans.iter().any(|s| s.name == "GET /api/hello"));
    assert!(spans.iter().any(|s| s.name == "GET /"));

    let resource = traces[0].resource_spans[0].resource.as_ref().unwrap();
    assert_eq!(string_attr(&resource.attributes, "service.name"), Some(SERVICE_NAME));
    assert_eq!(string_attr(&resource.attributes, "service.version"), Some("9.9.9"));

    let records: Vec<_> = collector
        .log_requests()
        .iter()
        .flat_map(|r| r.resource_logs.clone())
        .flat_map(|rl| rl.scope_logs)
        .flat_map(|sl| sl.log_records)
        .collect();
    assert_eq!(records.len(), 1);
    let body = records[0].body.as_ref().and_then(|b| b.value.as_ref());
    assert!(matches!(body, Some(AnyValue::StringValue(s)) if s == HELLO_LOG_MESSAGE));

    let hello_span = spans.iter().find(|s| s.name == "GET /api/hello").unwrap();
    assert_eq!(records[0].trace_id, hello_span.trace_id);
    assert_eq!(records[0].span_id, hello_span.span_id);

    let metric_names: Vec<String> = collector
        .metric_requests()
        .iter()
        .flat_map(|r| r.resource_metrics.clone())
        .flat_map(|rm| rm.scope_metrics)
        .flat_map(|sm| sm.metrics)
        .map(|m| m.name)
        .collect();
    assert!(metric_names
        .iter()
        .any(|n| n == telemetry::instrumentation::REQUEST_COUNT_METRIC));
    assert!(metric_names
        .iter()
        .any(|n| n == telemetry::instrumentation::REQUEST_DURATION_METRIC));

    let stats = telemetry.stats();
    assert_eq!(stats.traces.exported, 2);
    assert_eq!(stats.traces.dropped, 0);
    assert_eq!(stats.logs.exported, 1);
}

#[tokio::test]
async fn test_unreachable_collector_does_not_affect_requests() {
    let retry = RetryConfig {
        max_attempts: 2,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(20),
    };
    let telemetry = telemetry_for("http://127.0.0.1:1", retry);
    let router = create_router(AppState::new(telemetry.clone()));

    for _ in 0..3 {
        let (status, _) = get(router.clone(), "/api/hello").await;
        assert_eq!(status, StatusCode::OK);
    }

    telemetry.force_flush(Duration::from_secs(10)).await;

    let stats = telemetry.stats();
    assert_eq!(stats.traces.recorded, 3);
    assert_eq!(stats.traces.exported, 0);
    assert_eq!(stats.traces.dropped, 3);
    assert!(stats.traces.failed_batches >= 1);

    let (status, health) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["telemetry"]["traces"]["dropped"], 3);

    telemetry.shutdown(Duration::from_secs(10)).await;
}

#[tokio::test]
async fn test_tls_mode_never_sends_plaintext() {
    let collector = MockCollector::start().await;
    let config = ExporterConfig::new(collector.endpoint())
        .with_security(Security::Tls)
        .with_timeout(Duration::from_secs(2));
    assert!(config.endpoint.starts_with("https://"));

    let exporter = LogExporter::new(Resource::builder(SERVICE_NAME).build(), config).unwrap();
    let result = exporter
        .export(&[LogRecord::new(LogLevel::Info, "secret")])
        .await;

    assert!(result.is_err());
    assert!(collector.log_requests().is_empty());
}

#[tokio::test]
async fn test_malformed_records_do_not_drop_their_batch() {
    let collector = MockCollector::start().await;
    let telemetry = telemetry_for(&collector.endpoint(), RetryConfig::default());

    let orders = telemetry.meter_provider().counter("orders");
    for _ in 0..3 {
        orders.add(1.0, &[]);
    }
    telemetry
        .meter_provider()
        .gauge("queue_depth")
        .record(f64::NAN, &[]);
    telemetry.logger_provider().emit(LogLevel::Info, "");
    telemetry.logger_provider().emit(LogLevel::Info, "kept");

    assert!(telemetry.shutdown(Duration::from_secs(10)).await);

    let metrics: Vec<_> = collector
        .metric_requests()
        .iter()
        .flat_map(|r| r.resource_metrics.clone())
        .flat_map(|rm| rm.scope_metrics)
        .flat_map(|sm| sm.metrics)
        .collect();
    assert!(metrics.iter().all(|m| m.name != "queue_depth"));
    let order_points: usize = metrics
        .iter()
        .filter(|m| m.name == "orders")
        .map(|m| match &m.data {
            Some(Data::Sum(sum)) => sum.data_points.len(),
            _ => 0,
        })
        .sum();
    assert_eq!(order_points, 3);

    let log_count: usize = collector
        .log_requests()
        .iter()
        .flat_map(|r| &r.resource_logs)
        .flat_map(|rl| &rl.scope_logs)
        .map(|sl| sl.log_records.len())
        .sum();
    assert_eq!(log_count, 1);

    let stats = telemetry.stats();
    assert_eq!(stats.metrics.exported, 3);
    assert_eq!(stats.metrics.invalid, 1);
    assert_eq!(stats.metrics.failed_batches, 0);
    assert_eq!(stats.logs.exported, 1);
    assert_eq!(stats.logs.invalid, 1);
}
