//! Error taxonomy and its HTTP mapping.
//!
//! Every error leaving the pipeline is rendered as
//! `{"error": <code>, "message": <text>}`. Internal details are logged,
//! never serialized.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by pipeline stages and handlers.
#[derive(Debug, Error)]
pub enum GateError {
    /// Missing or unreadable configuration material. Disables the feature at boot.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The client sent something we refuse (4xx).
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Too many failed attempts for this client key.
    #[error("rate limit exceeded")]
    RateLimited,

    /// A backing dependency is unreachable.
    #[error("dependency error: {0}")]
    Dependency(String),

    /// The upstream renderer could not be reached or answered garbage.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The upstream renderer did not answer in time.
    #[error("upstream timed out")]
    UpstreamTimeout,

    /// Anything unexpected. Rendered as a generic 500.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Client-side failures. Messages are safe to return verbatim.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    BadRequest(String),

    /// Every authentication failure maps here so all of them look alike.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// Generic body used for 500 responses.
pub const INTERNAL_MESSAGE: &str = "Internal Server Error";

impl GateError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        GateError::Client(ClientError::Unauthorized(message.into()))
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        GateError::Client(ClientError::Forbidden(message.into()))
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        GateError::Client(ClientError::BadRequest(message.into()))
    }

    /// Status code this error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::Client(ClientError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            GateError::Client(ClientError::Unauthorized(_)) => StatusCode::UNAUTHORIZED,
            GateError::Client(ClientError::Forbidden(_)) => StatusCode::FORBIDDEN,
            GateError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GateError::Dependency(_) => StatusCode::SERVICE_UNAVAILABLE,
            GateError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GateError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            GateError::Configuration(_) | GateError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            GateError::Client(ClientError::BadRequest(message)) => ErrorBody {
                error: "bad_request",
                message,
            },
            GateError::Client(ClientError::Unauthorized(message)) => ErrorBody {
                error: "unauthorized",
                message,
            },
            GateError::Client(ClientError::Forbidden(message)) => ErrorBody {
                error: "forbidden",
                message,
            },
            GateError::RateLimited => ErrorBody {
                error: "too_many_requests",
                message: "Too many login attempts. Please try again later.".to_string(),
            },
            GateError::Dependency(detail) => {
                tracing::error!(error = %detail, "Dependency unavailable");
                ErrorBody {
                    error: "service_unavailable",
                    message: "Service temporarily unavailable".to_string(),
                }
            }
            GateError::Upstream(detail) => {
                tracing::error!(error = %detail, "Upstream request failed");
                ErrorBody {
                    error: "bad_gateway",
                    message: "Upstream request failed".to_string(),
                }
            }
            GateError::UpstreamTimeout => {
                tracing::error!("Upstream request timed out");
                ErrorBody {
                    error: "gateway_timeout",
                    message: "Upstream request timed out".to_string(),
                }
            }
            GateError::Configuration(detail) | GateError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                ErrorBody {
                    error: "internal_error",
                    message: INTERNAL_MESSAGE.to_string(),
                }
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_internal_detail_is_not_leaked() {
        let response = GateError::Internal("db password is hunter2".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "internal_error");
        assert!(!body.to_string().contains("hunter2"));
    }

    #[tokio::test]
    async fn test_unauthorized_shape() {
        let response = GateError::unauthorized("Invalid credentials").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["message"], "Invalid credentials");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(GateError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(GateError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            GateError::Dependency("redis".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(GateError::Upstream("refused".into()).status(), StatusCode::BAD_GATEWAY);
        assert_eq!(GateError::UpstreamTimeout.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
