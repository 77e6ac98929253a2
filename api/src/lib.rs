//! otel-demo API Server
//!
//! This crate provides a small HTTP service that exports its own traces,
//! metrics, and logs to an OpenTelemetry collector over OTLP/gRPC.
//!
//! # Architecture
//!
//! The API server is built on Axum and Tokio, providing:
//! - Greeting endpoints (`/`, `/api/hello`)
//! - A health endpoint reporting telemetry pipeline counters
//! - Request instrumentation through [`middleware::InstrumentationLayer`]
//!
//! Startup order is fixed: configuration, telemetry pipelines, registry
//! install, tracing subscriber, then the listener. On shutdown the HTTP
//! server drains first and the telemetry pipelines are flushed last.
//!
//! # Example
//!
//! ```no_run
//! use api::run_server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     run_server().await
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod config;
pub mod middleware;
mod routes;
mod state;

pub use config::{Config, LogFormat};
pub use routes::{Greeting, HealthResponse, HELLO_LOG_MESSAGE, HELLO_MESSAGE, ROOT_MESSAGE};
pub use state::AppState;

use anyhow::{Context, Result};
use axum::Router;
use middleware::InstrumentationLayer;
use telemetry::bridge::LogBridgeLayer;
use telemetry::registry::TelemetryBuilder;
use telemetry::{Resource, Telemetry};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Runs the otel-demo API server.
///
/// Loads configuration from the environment, starts and installs the
/// telemetry pipelines, installs the tracing subscriber and serves until
/// SIGTERM/SIGINT.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be loaded from environment
/// - The telemetry pipelines cannot be built
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server() -> Result<()> {
    let config = Config::from_env()?;
    let telemetry = init_telemetry(&config)?;
    init_tracing(&config, &telemetry)?;
    run_server_with_config(config, telemetry).await
}

/// Builds the telemetry pipelines for `config` and installs them globally.
///
/// No network connection is made; exporters connect on first export.
///
/// # Errors
///
/// Returns an error if the pipelines cannot be built or telemetry was
/// already installed in this process.
pub fn init_telemetry(config: &Config) -> Result<Telemetry> {
    let resource = Resource::builder(config.service_name.clone())
        .with_service_version(env!("CARGO_PKG_VERSION"))
        .with_env()
        .build();
    let telemetry = TelemetryBuilder::from_config(resource, config.telemetry.clone())
        .build()
        .context("failed to build telemetry pipelines")?;
    telemetry::install(telemetry.clone())?;
    Ok(telemetry)
}

/// Installs the global tracing subscriber.
///
/// Local output honours `RUST_LOG` (default `info`) and
/// [`Config::log_format`]. Events at INFO and above are also forwarded to
/// the log pipeline.
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn init_tracing(config: &Config, telemetry: &Telemetry) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
    };
    let bridge = LogBridgeLayer::new(telemetry.logger_provider().clone()).with_filter(LevelFilter::INFO);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(env_filter))
        .with(bridge)
        .try_init()?;
    Ok(())
}

/// Runs the API server with the provided configuration and telemetry.
///
/// This is useful for testing or when you want to provide configuration programmatically.
///
/// # Errors
///
/// Returns an error if:
/// - The server fails to bind to the configured address
/// - A fatal error occurs during operation
pub async fn run_server_with_config(config: Config, telemetry: Telemetry) -> Result<()> {
    let addr = config.socket_addr()?;

    tracing::info!(
        host = %config.host,
        port = %config.port,
        service = %config.service_name,
        endpoint = %config.telemetry.collector.endpoint,
        "otel-demo API server starting"
    );

    let app = create_router(AppState::new(telemetry.clone()));
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(%addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, flushing telemetry");
    if !telemetry.shutdown(config.shutdown_timeout).await {
        tracing::warn!(
            timeout_ms = config.shutdown_timeout.as_millis(),
            "Telemetry did not flush completely before the shutdown timeout"
        );
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Creates the main application router with all routes and middleware.
///
/// This function is public to allow testing the router without starting a full server.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(routes::greeting_routes())
        .merge(routes::health_routes())
        .layer(InstrumentationLayer::new(state.interceptor()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
