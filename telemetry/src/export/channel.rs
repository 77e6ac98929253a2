//! Lazily connected gRPC channel to the collector.

use super::ExportError;
use crate::config::{ExporterConfig, Security};
use tokio::sync::Mutex;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::Code;

/// A gRPC channel that connects on first use.
///
/// Building an exporter never touches the network. The first export connects;
/// a failed connect or an `Unavailable` response discards the channel so the
/// next export reconnects.
#[derive(Debug)]
pub struct OtlpChannel {
    config: ExporterConfig,
    endpoint: Endpoint,
    channel: Mutex<Option<Channel>>,
}

impl OtlpChannel {
    /// Prepares a channel for the configured collector without connecting.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidEndpoint`] if the endpoint is not a valid
    /// URI or TLS cannot be configured.
    pub fn new(mut config: ExporterConfig) -> Result<Self, ExportError> {
        // A TLS config is ignored on `http` URIs, so the scheme must follow
        // the security mode.
        config.endpoint = config.transport_endpoint();
        let invalid = |source| ExportError::InvalidEndpoint {
            endpoint: config.endpoint.clone(),
            source,
        };

        let mut endpoint = Endpoint::from_shared(config.endpoint.clone())
            .map_err(invalid)?
            .connect_timeout(config.timeout)
            .timeout(config.timeout);

        if config.security == Security::Tls {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(invalid)?;
        }

        Ok(Self {
            config,
            endpoint,
            channel: Mutex::new(None),
        })
    }

    /// The collector endpoint this channel talks to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// Returns the open channel, connecting if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Connect`] if the collector cannot be reached.
    pub async fn get(&self) -> Result<Channel, ExportError> {
        let mut guard = self.channel.lock().await;
        if let Some(channel) = guard.as_ref() {
            return Ok(channel.clone());
        }

        tracing::debug!(endpoint = %self.config.endpoint, "Connecting to collector");
        let channel = self
            .endpoint
            .connect()
            .await
            .map_err(|source| ExportError::Connect {
                endpoint: self.config.endpoint.clone(),
                source,
            })?;
        *guard = Some(channel.clone());
        Ok(channel)
    }

    /// Returns true if a connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.channel.lock().await.is_some()
    }

    /// Drops the current connection.
    pub async fn reset(&self) {
        self.channel.lock().await.take();
    }

    /// Converts a failed RPC into an export error, dropping the connection
    /// when the collector looks gone.
    pub(crate) async fn handle_status(&self, status: tonic::Status) -> ExportError {
        if status.code() == Code::Unavailable {
            self.reset().await;
        }
        ExportError::Rpc(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let channel = OtlpChannel::new(ExporterConfig::new("http://127.0.0.1:4317")).unwrap();
        assert!(!channel.is_connected().await);
        assert_eq!(channel.endpoint(), "http://127.0.0.1:4317");
    }

    #[tokio::test]
    async fn test_tls_channel_builds() {
        let config = ExporterConfig::new("https://collector.example.com:4317").with_security(Security::Tls);
        let channel = tokio_test::assert_ok!(OtlpChannel::new(config));
        assert!(!channel.is_connected().await);
    }

    #[test]
    fn test_tls_mode_upgrades_plain_endpoint() {
        let config = ExporterConfig {
            security: Security::Tls,
            ..ExporterConfig::new("http://collector.example.com:4317")
        };
        let channel = OtlpChannel::new(config).unwrap();
        assert_eq!(channel.endpoint(), "https://collector.example.com:4317");
    }

    #[test]
    fn test_insecure_mode_downgrades_https_endpoint() {
        let config = ExporterConfig {
            security: Security::Insecure,
            ..ExporterConfig::new("https://collector.example.com:4317")
        };
        let channel = OtlpChannel::new(config).unwrap();
        assert_eq!(channel.endpoint(), "http://collector.example.com:4317");
    }

    #[test]
    fn test_invalid_endpoint() {
        let config = ExporterConfig::new("http://exa mple.com");
        assert!(matches!(
            OtlpChannel::new(config),
            Err(ExportError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn test_connect_failure_is_retryable() {
        // Port 1 is reserved and closed on test machines.
        let config = ExporterConfig::new("http://127.0.0.1:1").with_timeout(Duration::from_millis(500));
        let channel = OtlpChannel::new(config).unwrap();

        let err = channel.get().await.unwrap_err();
        assert!(matches!(err, ExportError::Connect { .. }));
        assert!(err.is_retryable());
        assert!(!channel.is_connected().await);
    }
}
