//! otel-demo API Server Binary
//!
//! Entry point for the otel-demo service.

#![deny(unsafe_code)]

use anyhow::Result;
use api::{init_telemetry, init_tracing, run_server_with_config, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is not an error
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    let telemetry = init_telemetry(&config)?;
    init_tracing(&config, &telemetry)?;

    run_server_with_config(config, telemetry).await
}
