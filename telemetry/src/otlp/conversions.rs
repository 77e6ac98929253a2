//! Conversions between internal signal records and OTLP protobuf types.
//!
//! Builds the `Export*ServiceRequest` messages sent by the exporters. The
//! decoding helpers are compiled for tests only.

use crate::models::{LogRecord, MetricKind, MetricPoint, Span, SpanKind, SpanStatus};
use crate::otlp::proto;
use crate::resource::Resource;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Instrumentation scope reported for every batch.
pub const SCOPE_NAME: &str = env!("CARGO_PKG_NAME");

/// Explicit bucket bounds used when encoding histogram observations.
pub const DEFAULT_HISTOGRAM_BOUNDS: [f64; 15] = [
    0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 250.0, 500.0, 750.0, 1000.0, 2500.0, 5000.0, 7500.0,
    10000.0,
];

/// Converts a `DateTime<Utc>` to OTLP nanoseconds since epoch.
///
/// Times before the epoch or beyond the representable range become zero.
#[must_use]
pub fn datetime_to_nanos(dt: DateTime<Utc>) -> u64 {
    dt.timestamp_nanos_opt()
        .and_then(|n| u64::try_from(n).ok())
        .unwrap_or(0)
}

/// Converts an OTLP timestamp (nanoseconds since epoch) to a `DateTime<Utc>`.
#[cfg(test)]
pub(crate) fn timestamp_to_datetime(nanos: u64) -> DateTime<Utc> {
    let duration = std::time::Duration::from_nanos(nanos);
    DateTime::<Utc>::from(std::time::UNIX_EPOCH + duration)
}

/// Converts a `serde_json::Value` attribute to an OTLP `AnyValue`.
#[must_use]
pub fn json_to_any_value(value: &serde_json::Value) -> proto::common::v1::AnyValue {
    use proto::common::v1::any_value::Value;
    use proto::common::v1::{AnyValue, ArrayValue, KeyValueList};

    let value = match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::BoolValue(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::IntValue(i)),
            None => n.as_f64().map(Value::DoubleValue),
        },
        serde_json::Value::String(s) => Some(Value::StringValue(s.clone())),
        serde_json::Value::Array(items) => Some(Value::ArrayValue(ArrayValue {
            values: items.iter().map(json_to_any_value).collect(),
        })),
        serde_json::Value::Object(map) => Some(Value::KvlistValue(KeyValueList {
            values: map
                .iter()
                .map(|(k, v)| key_value(k.clone(), json_to_any_value(v)))
                .collect(),
        })),
    };

    AnyValue { value }
}

/// Converts an OTLP `AnyValue` back to `serde_json::Value`.
#[cfg(test)]
pub(crate) fn any_value_to_json(value: &proto::common::v1::AnyValue) -> serde_json::Value {
    use proto::common::v1::any_value::Value;

    match &value.value {
        Some(Value::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Value::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Value::IntValue(i)) => serde_json::Value::Number((*i).into()),
        Some(Value::DoubleValue(d)) => serde_json::Number::from_f64(*d)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(Value::ArrayValue(arr)) => {
            serde_json::Value::Array(arr.values.iter().map(any_value_to_json).collect())
        }
        Some(Value::KvlistValue(kv)) => {
            let mut map = serde_json::Map::new();
            for pair in &kv.values {
                if let Some(ref v) = pair.value {
                    map.insert(pair.key.clone(), any_value_to_json(v));
                }
            }
            serde_json::Value::Object(map)
        }
        Some(Value::BytesValue(b)) => serde_json::Value::String(hex::encode(b)),
        None => serde_json::Value::Null,
    }
}

/// Converts OTLP key-value pairs to a `HashMap`.
#[cfg(test)]
pub(crate) fn key_values_to_map(
    attributes: &[proto::common::v1::KeyValue],
) -> HashMap<String, serde_json::Value> {
    attributes
        .iter()
        .filter_map(|kv| {
            kv.value
                .as_ref()
                .map(|v| (kv.key.clone(), any_value_to_json(v)))
        })
        .collect()
}

fn key_value(key: String, value: proto::common::v1::AnyValue) -> proto::common::v1::KeyValue {
    proto::common::v1::KeyValue {
        key,
        value: Some(value),
        ..Default::default()
    }
}

/// Converts an attribute map to OTLP key-values, sorted by key.
fn map_to_key_values(
    attributes: &HashMap<String, serde_json::Value>,
) -> Vec<proto::common::v1::KeyValue> {
    let mut keys: Vec<&String> = attributes.keys().collect();
    keys.sort_unstable();
    keys.into_iter()
        .map(|k| key_value(k.clone(), json_to_any_value(&attributes[k])))
        .collect()
}

/// Converts string labels to OTLP key-values, sorted by key.
fn labels_to_key_values(labels: &HashMap<String, String>) -> Vec<proto::common::v1::KeyValue> {
    let mut pairs: Vec<(&String, &String)> = labels.iter().collect();
    pairs.sort_unstable();
    pairs
        .into_iter()
        .map(|(k, v)| {
            key_value(
                k.clone(),
                proto::common::v1::AnyValue {
                    value: Some(proto::common::v1::any_value::Value::StringValue(v.clone())),
                },
            )
        })
        .collect()
}

/// Converts the resource descriptor to its OTLP form.
#[must_use]
pub fn resource_to_proto(resource: &Resource) -> proto::resource::v1::Resource {
    proto::resource::v1::Resource {
        attributes: resource
            .iter()
            .map(|(k, v)| key_value(k.clone(), json_to_any_value(v)))
            .collect(),
        ..Default::default()
    }
}

fn instrumentation_scope() -> proto::common::v1::InstrumentationScope {
    proto::common::v1::InstrumentationScope {
        name: SCOPE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        ..Default::default()
    }
}

fn span_kind_to_otlp(kind: SpanKind) -> proto::trace::v1::span::SpanKind {
    use proto::trace::v1::span::SpanKind as OtlpSpanKind;

    match kind {
        SpanKind::Internal => OtlpSpanKind::Internal,
        SpanKind::Server => OtlpSpanKind::Server,
        SpanKind::Client => OtlpSpanKind::Client,
        SpanKind::Producer => OtlpSpanKind::Producer,
        SpanKind::Consumer => OtlpSpanKind::Consumer,
    }
}

fn span_status_to_otlp(status: SpanStatus, message: Option<&str>) -> proto::trace::v1::Status {
    use proto::trace::v1::status::StatusCode;

    let code = match status {
        SpanStatus::Unset => StatusCode::Unset,
        SpanStatus::Ok => StatusCode::Ok,
        SpanStatus::Error => StatusCode::Error,
    };

    proto::trace::v1::Status {
        message: message.unwrap_or_default().to_string(),
        code: code as i32,
    }
}

/// Converts a `Span` to its OTLP form.
#[must_use]
pub fn span_to_otlp(span: &Span) -> proto::trace::v1::Span {
    proto::trace::v1::Span {
        trace_id: span.trace_id.to_bytes().to_vec(),
        span_id: span.span_id.to_bytes().to_vec(),
        parent_span_id: span
            .parent_span_id
            .map(|id| id.to_bytes().to_vec())
            .unwrap_or_default(),
        name: span.name.clone(),
        kind: span_kind_to_otlp(span.kind) as i32,
        start_time_unix_nano: datetime_to_nanos(span.start_time),
        end_time_unix_nano: datetime_to_nanos(span.end_time),
        attributes: map_to_key_values(&span.attributes),
        status: Some(span_status_to_otlp(
            span.status,
            span.status_message.as_deref(),
        )),
        ..Default::default()
    }
}

/// Builds an `ExportTraceServiceRequest` for one batch of spans.
#[must_use]
pub fn spans_to_request(
    resource: &Resource,
    spans: &[Span],
) -> proto::collector::trace::v1::ExportTraceServiceRequest {
    proto::collector::trace::v1::ExportTraceServiceRequest {
        resource_spans: vec![proto::trace::v1::ResourceSpans {
            resource: Some(resource_to_proto(resource)),
            scope_spans: vec![proto::trace::v1::ScopeSpans {
                scope: Some(instrumentation_scope()),
                spans: spans.iter().map(span_to_otlp).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Returns the bucket index for `value` given ascending explicit bounds.
///
/// Bucket `i` covers `(bounds[i-1], bounds[i]]`; the last bucket is unbounded.
fn bucket_index(bounds: &[f64], value: f64) -> usize {
    bounds
        .iter()
        .position(|bound| value <= *bound)
        .unwrap_or(bounds.len())
}

fn number_data_point(point: &MetricPoint) -> proto::metrics::v1::NumberDataPoint {
    proto::metrics::v1::NumberDataPoint {
        attributes: labels_to_key_values(&point.labels),
        time_unix_nano: datetime_to_nanos(point.timestamp),
        value: Some(proto::metrics::v1::number_data_point::Value::AsDouble(
            point.value,
        )),
        ..Default::default()
    }
}

fn histogram_data_point(point: &MetricPoint) -> proto::metrics::v1::HistogramDataPoint {
    let mut bucket_counts = vec![0u64; DEFAULT_HISTOGRAM_BOUNDS.len() + 1];
    bucket_counts[bucket_index(&DEFAULT_HISTOGRAM_BOUNDS, point.value)] = 1;

    proto::metrics::v1::HistogramDataPoint {
        attributes: labels_to_key_values(&point.labels),
        time_unix_nano: datetime_to_nanos(point.timestamp),
        count: 1,
        sum: Some(point.value),
        bucket_counts,
        explicit_bounds: DEFAULT_HISTOGRAM_BOUNDS.to_vec(),
        min: Some(point.value),
        max: Some(point.value),
        ..Default::default()
    }
}

fn empty_metric(point: &MetricPoint) -> proto::metrics::v1::Metric {
    use proto::metrics::v1::{metric::Data, AggregationTemporality, Gauge, Histogram, Sum};

    let data = match point.kind {
        MetricKind::Counter => Data::Sum(Sum {
            data_points: Vec::new(),
            aggregation_temporality: AggregationTemporality::Delta as i32,
            is_monotonic: true,
        }),
        MetricKind::Gauge => Data::Gauge(Gauge {
            data_points: Vec::new(),
        }),
        MetricKind::Histogram => Data::Histogram(Histogram {
            data_points: Vec::new(),
            aggregation_temporality: AggregationTemporality::Delta as i32,
        }),
    };

    proto::metrics::v1::Metric {
        name: point.name.clone(),
        description: point.description.clone().unwrap_or_default(),
        unit: point.unit.clone().unwrap_or_default(),
        data: Some(data),
        ..Default::default()
    }
}

fn push_data_point(metric: &mut proto::metrics::v1::Metric, point: &MetricPoint) {
    use proto::metrics::v1::metric::Data;

    match metric.data.as_mut() {
        Some(Data::Sum(sum)) => sum.data_points.push(number_data_point(point)),
        Some(Data::Gauge(gauge)) => gauge.data_points.push(number_data_point(point)),
        Some(Data::Histogram(histogram)) => {
            histogram.data_points.push(histogram_data_point(point));
        }
        _ => {}
    }
}

/// Builds an `ExportMetricsServiceRequest` for one batch of metric points.
///
/// Points sharing a name and kind are grouped into one OTLP metric, in the
/// order their instrument was first seen in the batch.
#[must_use]
pub fn metrics_to_request(
    resource: &Resource,
    points: &[MetricPoint],
) -> proto::collector::metrics::v1::ExportMetricsServiceRequest {
    let mut metrics: Vec<proto::metrics::v1::Metric> = Vec::new();
    let mut index: HashMap<(&str, MetricKind), usize> = HashMap::new();

    for point in points {
        let slot = *index
            .entry((point.name.as_str(), point.kind))
            .or_insert_with(|| {
                metrics.push(empty_metric(point));
                metrics.len() - 1
            });
        push_data_point(&mut metrics[slot], point);
    }

    proto::collector::metrics::v1::ExportMetricsServiceRequest {
        resource_metrics: vec![proto::metrics::v1::ResourceMetrics {
            resource: Some(resource_to_proto(resource)),
            scope_metrics: vec![proto::metrics::v1::ScopeMetrics {
                scope: Some(instrumentation_scope()),
                metrics,
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}

/// Converts a `LogRecord` to its OTLP form.
#[must_use]
pub fn log_record_to_otlp(record: &LogRecord) -> proto::logs::v1::LogRecord {
    let time = datetime_to_nanos(record.timestamp);
    proto::logs::v1::LogRecord {
        time_unix_nano: time,
        observed_time_unix_nano: time,
        severity_number: record.level.severity_number(),
        severity_text: record.level.severity_text().to_string(),
        body: Some(proto::common::v1::AnyValue {
            value: Some(proto::common::v1::any_value::Value::StringValue(
                record.message.clone(),
            )),
        }),
        attributes: map_to_key_values(&record.attributes),
        trace_id: record
            .trace_id
            .map(|id| id.to_bytes().to_vec())
            .unwrap_or_default(),
        span_id: record
            .span_id
            .map(|id| id.to_bytes().to_vec())
            .unwrap_or_default(),
        ..Default::default()
    }
}

/// Builds an `ExportLogsServiceRequest` for one batch of log records.
#[must_use]
pub fn logs_to_request(
    resource: &Resource,
    records: &[LogRecord],
) -> proto::collector::logs::v1::ExportLogsServiceRequest {
    proto::collector::logs::v1::ExportLogsServiceRequest {
        resource_logs: vec![proto::logs::v1::ResourceLogs {
            resource: Some(resource_to_proto(resource)),
            scope_logs: vec![proto::logs::v1::ScopeLogs {
                scope: Some(instrumentation_scope()),
                log_records: records.iter().map(log_record_to_otlp).collect(),
                ..Default::default()
            }],
            ..Default::default()
        }],
    }
}


#[cfg(test)]
#[path = "conversions_test.rs"]
mod conversions_test;
