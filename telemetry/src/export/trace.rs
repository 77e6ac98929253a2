//! OTLP/gRPC span exporter.

use super::{check_partial_success, validate_batch, ExportError, Exporter, OtlpChannel};
use crate::config::ExporterConfig;
use crate::models::Span;
use crate::otlp::conversions::spans_to_request;
use crate::otlp::proto::collector::trace::v1::trace_service_client::TraceServiceClient;
use crate::resource::Resource;
use prost::Message;

/// Sends span batches to a collector's `TraceService`.
#[derive(Debug)]
pub struct SpanExporter {
    resource: Resource,
    channel: OtlpChannel,
}

impl SpanExporter {
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
impl Exporter<Span> for SpanExporter {
    async fn export(&self, batch: &[Span]) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }
        validate_batch(batch, Span::validate_span)?;

        let request = spans_to_request(&self.resource, batch);
        tracing::debug!(spans = batch.len(), bytes = request.encoded_len(), "Sending spans");
        let mut client = TraceServiceClient::new(self.channel.get().await?);
        match client.export(request).await {
            Ok(response) => match response.into_inner().partial_success {
                Some(partial) => check_partial_success(partial.rejected_spans, partial.error_message),
                None => Ok(()),
            },
            Err(status) => Err(self.channel.handle_status(status).await),
        }
    }

    async fn shutdown(&self) {
        self.channel.reset().await;
    }
}
