//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use telemetry::config::{
    BatchConfig, ExporterConfig, PipelineConfig, RetryConfig, Security, TelemetryConfig,
    DEFAULT_ENDPOINT,
};

/// Default service name reported in the resource.
pub const DEFAULT_SERVICE_NAME: &str = "rust-service";

/// Output format of the local log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => anyhow::bail!("unknown log format '{other}', expected 'text' or 'json'"),
        }
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `OTEL_DEMO_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `OTEL_DEMO_PORT`: The port to listen on (default: 8080)
/// - `OTEL_SERVICE_NAME`: Service name in the resource (default: "rust-service")
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: Collector URL (default: `http://localhost:4317`)
/// - `OTEL_EXPORTER_OTLP_INSECURE`: Plain-text transport (default: true; an
///   `https` endpoint uses TLS unless this is explicitly `true`). The endpoint
///   scheme is switched to `http`/`https` to match.
/// - `OTEL_EXPORTER_OTLP_TIMEOUT`: Export timeout in ms (default: 10000)
/// - `OTEL_BSP_MAX_EXPORT_BATCH_SIZE`, `OTEL_BSP_SCHEDULE_DELAY`,
///   `OTEL_BSP_MAX_QUEUE_SIZE`: Trace batching (512 / 5000 ms / 2048)
/// - `OTEL_BLRP_MAX_EXPORT_BATCH_SIZE`, `OTEL_BLRP_SCHEDULE_DELAY`,
///   `OTEL_BLRP_MAX_QUEUE_SIZE`: Log batching (512 / 1000 ms / 2048)
/// - `OTEL_METRIC_EXPORT_INTERVAL`: Metric flush delay in ms (default: 60000)
/// - `OTEL_DEMO_SHUTDOWN_TIMEOUT`: Telemetry shutdown bound in ms (default: 5000)
/// - `OTEL_DEMO_LOG_FORMAT`: `text` or `json` (default: text)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Service name reported to the collector.
    pub service_name: String,
    /// Collector connection and batching policy.
    pub telemetry: TelemetryConfig,
    /// Upper bound for flushing telemetry on shutdown.
    pub shutdown_timeout: Duration,
    /// Local log output format.
    pub log_format: LogFormat,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or the
    /// resulting telemetry configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let parse = |name: &str| -> Result<Option<u64>> {
            lookup(name)
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .with_context(|| format!("{name} must be a non-negative integer"))
        };
        let millis = |name: &str, default: Duration| -> Result<Duration> {
            Ok(parse(name)?.map_or(default, Duration::from_millis))
        };
        let size = |name: &str, default: usize| -> Result<usize> {
            parse(name)?
                .map(usize::try_from)
                .transpose()
                .with_context(|| format!("{name} is too large"))
                .map(|v| v.unwrap_or(default))
        };
        let batch = |prefix: &str, base: BatchConfig, delay_var: &str| -> Result<BatchConfig> {
            let max_batch_size = size(&format!("{prefix}_MAX_EXPORT_BATCH_SIZE"), base.max_batch_size)?;
            let max_queue_size = size(&format!("{prefix}_MAX_QUEUE_SIZE"), base.max_queue_size)?;
            let max_delay = millis(delay_var, base.max_delay)?;
            Ok(base
                .with_max_batch_size(max_batch_size)
                .with_max_queue_size(max_queue_size)
                .with_max_delay(max_delay))
        };

        let host = lookup("OTEL_DEMO_HOST").unwrap_or(defaults.host);
        let port = lookup("OTEL_DEMO_PORT")
            .map(|p| p.parse::<u16>())
            .transpose()
            .context("OTEL_DEMO_PORT must be a valid port number")?
            .unwrap_or(defaults.port);
        let service_name = lookup("OTEL_SERVICE_NAME")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(defaults.service_name);

        let endpoint = lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let insecure = lookup("OTEL_EXPORTER_OTLP_INSECURE")
            .map(|v| parse_bool(&v))
            .transpose()
            .context("OTEL_EXPORTER_OTLP_INSECURE must be true or false")?;
        let collector = ExporterConfig::new(endpoint);
        let security = resolve_security(&collector.endpoint, insecure);
        let timeout = millis("OTEL_EXPORTER_OTLP_TIMEOUT", collector.timeout)?;
        let collector = collector.with_security(security).with_timeout(timeout);

        let pipeline = PipelineConfig {
            traces: batch("OTEL_BSP", BatchConfig::traces(), "OTEL_BSP_SCHEDULE_DELAY")?,
            metrics: BatchConfig::metrics().with_max_delay(millis(
                "OTEL_METRIC_EXPORT_INTERVAL",
                BatchConfig::metrics().max_delay,
            )?),
            logs: batch("OTEL_BLRP", BatchConfig::logs(), "OTEL_BLRP_SCHEDULE_DELAY")?,
            retry: RetryConfig::default(),
        };

        let telemetry = TelemetryConfig {
            pipeline,
            collector,
        };
        telemetry.validate()?;

        let log_format = lookup("OTEL_DEMO_LOG_FORMAT")
            .map(|v| v.parse::<LogFormat>())
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            host,
            port,
            service_name,
            telemetry,
            shutdown_timeout: millis("OTEL_DEMO_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout)?,
            log_format,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            telemetry: TelemetryConfig::default(),
            shutdown_timeout: Duration::from_secs(5),
            log_format: LogFormat::Text,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => anyhow::bail!("invalid boolean '{other}'"),
    }
}

/// An explicit setting wins; otherwise the endpoint scheme decides. The
/// endpoint scheme is rewritten to match by [`ExporterConfig::with_security`].
fn resolve_security(endpoint: &str, insecure: Option<bool>) -> Security {
    match insecure {
        Some(true) => Security::Insecure,
        Some(false) => Security::Tls,
        None if endpoint.starts_with("https://") => Security::Tls,
        None => Security::Insecure,
    }
}
