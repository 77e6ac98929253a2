//! OTLP/gRPC log exporter.

use super::{check_partial_success, validate_batch, ExportError, Exporter, OtlpChannel};
use crate::config::ExporterConfig;
use crate::models::LogRecord;
use crate::otlp::conversions::logs_to_request;
use crate::otlp::proto::collector::logs::v1::logs_service_client::LogsServiceClient;
use crate::resource::Resource;
use prost::Message;

/// Sends log record batches to a collector's `LogsService`.
#[derive(Debug)]
pub struct LogExporter {
    resource: Resource,
    channel: OtlpChannel,
}

impl LogExporter {
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
impl Exporter<LogRecord> for LogExporter {
    async fn export(&self, batch: &[LogRecord]) -> Result<(), ExportError> {
        if batch.is_empty() {
            return Ok(());
        }
        validate_batch(batch, LogRecord::validate_record)?;

        let request = logs_to_request(&self.resource, batch);
        tracing::debug!(records = batch.len(), bytes = request.encoded_len(), "Sending records");
        let mut client = LogsServiceClient::new(self.channel.get().await?);
        match client.export(request).await {
            Ok(response) => match response.into_inner().partial_success {
                Some(partial) => {
                    check_partial_success(partial.rejected_log_records, partial.error_message)
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
