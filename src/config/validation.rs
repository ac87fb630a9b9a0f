//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, attempts > 0)
//! - Validate addresses, URLs, algorithms and method names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::str::FromStr;

use axum::http::{HeaderName, Method};
use jsonwebtoken::Algorithm;

use crate::config::schema::{CounterStoreKind, GateConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path (or environment variable) of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.upstream_secs == 0 {
        errors.push(ValidationError::new("timeouts.upstream_secs", "must be greater than 0"));
    }

    match url::Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() == "http" && url.host().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            "upstream.url",
            "only http:// upstreams with a host are supported",
        )),
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }

    for method in &config.cors.allowed_methods {
        if Method::from_str(method).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_methods",
                format!("'{}' is not an HTTP method", method),
            ));
        }
    }
    for header in &config.cors.allowed_headers {
        if HeaderName::from_str(header).is_err() {
            errors.push(ValidationError::new(
                "cors.allowed_headers",
                format!("'{}' is not a header name", header),
            ));
        }
    }

    if Algorithm::from_str(&config.jwt.algorithm).is_err() {
        errors.push(ValidationError::new(
            "jwt.algorithm",
            format!("unknown algorithm '{}'", config.jwt.algorithm),
        ));
    }
    if config.jwt.ttl_secs == 0 {
        errors.push(ValidationError::new("jwt.ttl_secs", "must be greater than 0"));
    }
    for prefix in &config.jwt.protected_prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                "jwt.protected_prefixes",
                format!("'{}' must start with '/'", prefix),
            ));
        }
    }

    if config.rate_limit.max_attempts == 0 {
        errors.push(ValidationError::new("rate_limit.max_attempts", "must be greater than 0"));
    }
    if config.rate_limit.lockout_secs == 0 {
        errors.push(ValidationError::new("rate_limit.lockout_secs", "must be greater than 0"));
    }
    if config.rate_limit.store_timeout_ms == 0 {
        errors.push(ValidationError::new("rate_limit.store_timeout_ms", "must be greater than 0"));
    }
    if config.rate_limit.store == CounterStoreKind::Redis && config.rate_limit.redis_url.is_none() {
        errors.push(ValidationError::new(
            "rate_limit.redis_url",
            "required when store = \"redis\"",
        ));
    }

    if !config.login.path.starts_with('/') {
        errors.push(ValidationError::new("login.path", "must start with '/'"));
    }
    if !config.login.session_path.starts_with('/') {
        errors.push(ValidationError::new("login.session_path", "must start with '/'"));
    }
    if !config.login.logout_path.starts_with('/') {
        errors.push(ValidationError::new("login.logout_path", "must start with '/'"));
    }

    if config.cache_tags.enabled {
        for (field, name) in [
            ("cache_tags.header_name", &config.cache_tags.header_name),
            ("cache_tags.lifetime_header_name", &config.cache_tags.lifetime_header_name),
        ] {
            if HeaderName::from_str(name).is_err() {
                errors.push(ValidationError::new(field, format!("'{}' is not a header name", name)));
            }
        }
    }

    if config.health.check_timeout_ms == 0 {
        errors.push(ValidationError::new("health.check_timeout_ms", "must be greater than 0"));
    }
    let mut seen = HashSet::new();
    for check in &config.health.checks {
        if !seen.insert(check.name.as_str()) {
            errors.push(ValidationError::new(
                "health.checks",
                format!("duplicate check name '{}'", check.name),
            ));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
