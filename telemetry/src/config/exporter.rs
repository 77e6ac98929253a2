//! Collector connection settings shared by the OTLP exporters.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default OTLP/gRPC collector endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4317";

/// Transport security for the collector connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    /// Plain-text HTTP/2, for local or trusted-network collectors.
    #[default]
    Insecure,
    /// TLS using the platform's native root certificates.
    Tls,
}

impl Security {
    /// URI scheme the mode is spoken over.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Insecure => "http",
            Self::Tls => "https",
        }
    }
}

/// Where and how to reach the collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Collector URL, e.g. `http://otel-collector:4317`.
    pub endpoint: String,
    /// Transport security mode.
    #[serde(default)]
    pub security: Security,
    /// Timeout applied to connecting and to each export request.
    pub timeout: Duration,
}

impl ExporterConfig {
    /// Creates a config for the given endpoint with default security and timeout.
    ///
    /// Endpoints without a scheme are treated as `http://`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.contains("://") {
            endpoint
        } else {
            format!("http://{endpoint}")
        };
        Self {
            endpoint,
            ..Self::default()
        }
    }

    /// Sets the security mode and switches the endpoint scheme to match.
    #[must_use]
    pub fn with_security(mut self, security: Security) -> Self {
        self.security = security;
        self.endpoint = self.transport_endpoint();
        self
    }

    /// The endpoint with its scheme matching [`Self::security`].
    ///
    /// tonic negotiates TLS only for `https` URIs and refuses `https` URIs
    /// without a TLS config, so the scheme alone decides the transport.
    #[must_use]
    pub fn transport_endpoint(&self) -> String {
        let host = self
            .endpoint
            .strip_prefix("https://")
            .or_else(|| self.endpoint.strip_prefix("http://"));
        match host {
            Some(host) => format!("{}://{host}", self.security.scheme()),
            None => self.endpoint.clone(),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is empty or its scheme is not
    /// `http`/`https`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = ["http://", "https://"].iter().any(|scheme| {
            self.endpoint
                .strip_prefix(scheme)
                .is_some_and(|rest| !rest.is_empty())
        });
        if valid {
            Ok(())
        } else {
            Err(ConfigError::InvalidEndpoint(self.endpoint.clone()))
        }
    }
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            security: Security::Insecure,
            timeout: Duration::from_secs(10),
        }
    }
}
