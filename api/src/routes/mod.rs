//! API route definitions.
//!
//! This module organizes all HTTP routes for the otel-demo API server.

mod greeting;
mod health;

pub use greeting::{greeting_routes, Greeting, HELLO_LOG_MESSAGE, HELLO_MESSAGE, ROOT_MESSAGE};
pub use health::{health_routes, HealthResponse};
