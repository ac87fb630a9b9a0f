//! CORS stage.
//!
//! # Responsibilities
//! - Reject disallowed origins before anything downstream runs
//! - Answer preflight requests directly
//! - Decorate downstream responses for allowed origins

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GateError;
use crate::observability::metrics;
use crate::security::CorsPolicy;

const PREFLIGHT_MAX_AGE: &str = "86400";

pub async fn cors_stage(
    State(policy): State<Arc<CorsPolicy>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(origin) = request.headers().get(header::ORIGIN).cloned() else {
        return next.run(request).await;
    };

    let allowed = origin.to_str().is_ok_and(|o| policy.is_allowed(o));
    if !allowed {
        tracing::warn!(origin = ?origin, path = %request.uri().path(), "Origin not allowed");
        metrics::record_cors_rejection();
        return GateError::forbidden("Origin not allowed").into_response();
    }

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        let headers = response.headers_mut();
        decorate(headers, &policy, origin);
        headers.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static(PREFLIGHT_MAX_AGE),
        );
        return response;
    }

    let mut response = next.run(request).await;
    decorate(response.headers_mut(), &policy, origin);
    response
}

fn decorate(headers: &mut HeaderMap, policy: &CorsPolicy, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    // Both lists were validated as header tokens at config load.
    if let Ok(methods) = HeaderValue::from_str(policy.allow_methods()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
    }
    if let Ok(allow_headers) = HeaderValue::from_str(policy.allow_headers()) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, allow_headers);
    }
}
