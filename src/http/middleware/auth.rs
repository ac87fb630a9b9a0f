//! Bearer authentication stage.
//!
//! # Design Decisions
//! - Only paths under a protected prefix are checked
//! - Without a validator (no usable key at boot) the stage is inert
//! - Verified claims travel inward as a `Claims` request extension

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GateError;
use crate::observability::metrics;
use crate::security::{AuthError, TokenValidator};

pub const MISSING_HEADER: &str = "Missing or invalid Authorization header";
pub const INVALID_STRUCTURE: &str = "Invalid token structure";
pub const VALIDATION_FAILED: &str = "Token validation failed";

#[derive(Clone)]
pub struct AuthState {
    pub validator: Option<Arc<TokenValidator>>,
    pub protected_prefixes: Arc<Vec<String>>,
}

impl AuthState {
    fn protects(&self, path: &str) -> bool {
        self.protected_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

pub async fn auth_stage(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(validator) = state.validator.as_deref() else {
        return next.run(request).await;
    };
    if !state.protects(request.uri().path()) {
        return next.run(request).await;
    }

    let Some(token) = bearer_token(request.headers()) else {
        metrics::record_auth_failure("missing_header");
        return GateError::unauthorized(MISSING_HEADER).into_response();
    };

    match validator.validate(token) {
        Ok(claims) => {
            tracing::debug!(subject = ?claims.subject(), "Bearer token accepted");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::info!(path = %request.uri().path(), reason = %e, "Bearer token rejected");
            metrics::record_auth_failure(e.reason());
            let message = match e {
                AuthError::MalformedToken => INVALID_STRUCTURE,
                _ => VALIDATION_FAILED,
            };
            GateError::unauthorized(message).into_response()
        }
    }
}

/// Token after a case-insensitive `Bearer ` prefix, trimmed.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let prefix = value.get(..7)?;
    if !prefix.eq_ignore_ascii_case("bearer ") {
        return None;
    }
    Some(value[7..].trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer   abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Bearer ")), Some(""));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bear")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_prefix_matching() {
        let state = AuthState {
            validator: None,
            protected_prefixes: Arc::new(vec!["/api/".into()]),
        };
        assert!(state.protects("/api/orders"));
        assert!(!state.protects("/api"));
        assert!(!state.protects("/pages/api/"));
    }
}
