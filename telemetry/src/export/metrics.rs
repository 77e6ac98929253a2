//! OTLP/gRPC metric exporter.

use super::{check_partial_success, validate_batch, ExportError, Exporter, OtlpChannel};
use crate::config::ExporterConfig;
use crate::models::MetricPoint;
use crate::otlp::conversions::metrics_to_request;
use crate::otlp::proto::collector::metrics::v1::metrics_service_client::MetricsServiceClient;
use crate::resource::Resource;
use prost::Message;

/// Sends metric point batches to a collector's `MetricsService`.
#[derive(Debug)]
pub struct MetricExporter {
    resource: Resource,
    channel: OtlpChannel,
}

impl MetricExporter {
    /// Creates an exporter. No connection is made until the first export.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is invalid.
    pub fn new(resource: Resource, config: ExporterConfig) -> Result<Self, ExportError> {
        Ok(Self {
            resource,
            channel: OtlpChannel::new(config)?,
        })
    }
}

#[tonic::async_trait]
impl Exporter<MetricPoint> for MetricExporter {
    async fn export(&self, batch: &[MetricPoint]) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }
        validate_batch(batch, MetricPoint::validate_metric)?;

        let request = metrics_to_request(&self.resource, batch);
        tracing::debug!(points = batch.len(), bytes = request.encoded_len(), "Sending points");
        let mut client = MetricsServiceClient::new(self.channel.get().await?);
        match client.export(request).await {
            Ok(response) => match response.into_inner().partial_success {
                Some(partial) => {
                    check_partial_success(partial.rejected_data_points, partial.error_message)
                }
                None => Ok(()),
            },
            Err(status) => Err(self.channel.handle_status(status).await),
        }
    }

    async fn shutdown(&self) {
        self.channel.reset().await;
    }
}
