//! Greeting endpoints.

use crate::state::AppState;
use axum::{routing::get, Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Body of `GET /`.
pub const ROOT_MESSAGE: &str = "Rust OpenTelemetry Service";
/// Body of `GET /api/hello`.
pub const HELLO_MESSAGE: &str = "Hello from Rust with OpenTelemetry!";
/// Log line emitted by `GET /api/hello`.
pub const HELLO_LOG_MESSAGE: &str = "Hello endpoint called from Rust service";

/// Greeting response.
#[derive(Debug, Serialize)]
pub struct Greeting {
    /// Greeting text.
    pub message: &'static str,
    /// RFC 3339 UTC time the response was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Creates the greeting routes.
pub fn greeting_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/api/hello", get(hello))
}

async fn root() -> Json<Greeting> {
    Json(Greeting {
        message: ROOT_MESSAGE,
        timestamp: None,
    })
}

async fn hello() -> Json<Greeting> {
    tracing::info!("{HELLO_LOG_MESSAGE}");
    Json(Greeting {
        message: HELLO_MESSAGE,
        timestamp: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::DateTime;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let app = greeting_routes().with_state(testing::state());
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_root() {
        let (status, body) = get_json("/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"message": "Rust OpenTelemetry Service"}));
    }

    #[tokio::test]
    async fn test_hello() {
        let (status, body) = get_json("/api/hello").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Hello from Rust with OpenTelemetry!");

        let timestamp = body["timestamp"].as_str().unwrap();
        assert!(timestamp.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }
}
