//! Security response headers.
//!
//! # Responsibilities
//! - Add `Content-Security-Policy` built from configured sources
//! - Add `X-Content-Type-Options: nosniff`
//!
//! # Design Decisions
//! - Headers already set by the core handler are left untouched
//! - An unrepresentable CSP value is logged and skipped, never fatal

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

/// Render the CSP header value.
pub fn content_security_policy(config: &SecurityConfig) -> String {
    format!(
        "default-src {}; connect-src {};",
        config.csp_default_src, config.csp_connect_src
    )
}

/// Wrap `router` with the security header layers when enabled.
pub fn with_security_headers(router: Router, config: &SecurityConfig) -> Router {
    if !config.enable_headers {
        return router;
    }

    let router = router.layer(SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ));

    match HeaderValue::from_str(&content_security_policy(config)) {
        Ok(csp) => router.layer(SetResponseHeaderLayer::if_not_present(
            header::CONTENT_SECURITY_POLICY,
            csp,
        )),
        Err(_) => {
            tracing::error!(
                default_src = %config.csp_default_src,
                connect_src = %config.csp_connect_src,
                "CSP sources are not a valid header value, Content-Security-Policy disabled"
            );
            router
        }
    }
}
