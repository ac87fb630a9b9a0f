//! Health endpoint stage.
//!
//! Answers `/health/live` and `/health/ready` before any other stage runs.
//! Other `/health/` paths only pass the token check and continue inward.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::health::HealthProbe;

pub const HEALTH_TOKEN_HEADER: &str = "x-health-token";

pub async fn health_stage(
    State(probe): State<Arc<HealthProbe>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if !path.starts_with("/health/") {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(HEALTH_TOKEN_HEADER)
        .map(|v| v.as_bytes());
    if !probe.token_matches(presented) {
        tracing::warn!(path = %path, "Health endpoint token mismatch");
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" }))).into_response();
    }

    match path.as_str() {
        "/health/live" => (StatusCode::OK, Json(probe.liveness())).into_response(),
        "/health/ready" => {
            let status = probe.readiness().await;
            let code = if status.healthy {
                StatusCode::OK
            } else {
                StatusCode::SERVICE_UNAVAILABLE
            };
            (code, Json(status)).into_response()
        }
        _ => next.run(request).await,
    }
}
