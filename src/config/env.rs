//! Environment overrides.
//!
//! # Responsibilities
//! - Overlay environment variables onto a loaded `GateConfig`
//! - Parse comma lists, booleans and integers the same way for every key
//!
//! # Design Decisions
//! - Empty values mean "unset" and leave the file/default value in place
//! - Lookup is injected so tests never touch the process environment
//! - Every unparseable value is reported, not just the first

use std::str::FromStr;

use crate::config::schema::{CounterStoreKind, GateConfig};
use crate::config::validation::ValidationError;

/// Apply overrides read through `lookup` (normally `std::env::var`).
pub fn apply_env<F>(config: &mut GateConfig, lookup: F) -> Result<(), Vec<ValidationError>>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };
    let mut errors = Vec::new();

    if let Some(v) = env.string("BIND_ADDRESS") {
        config.listener.bind_address = v;
    }
    if let Some(v) = env.string("UPSTREAM_URL") {
        config.upstream.url = v;
    }

    if let Some(v) = env.list("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = v;
    }
    if let Some(v) = env.list("CORS_ALLOW_HEADERS") {
        config.cors.allowed_headers = v;
    }
    if let Some(v) = env.list("CORS_ALLOW_METHODS") {
        config.cors.allowed_methods = v;
    }

    if let Some(v) = env.string("JWT_PUBLIC_KEY_PATH") {
        config.jwt.public_key_path = Some(v);
    }
    if let Some(v) = env.string("JWT_PRIVATE_KEY_PATH") {
        config.jwt.private_key_path = Some(v);
    }
    if let Some(v) = env.string("JWT_ALGORITHM") {
        config.jwt.algorithm = v;
    }
    if let Some(v) = env.string("JWT_ISS") {
        config.jwt.issuer = v;
    }
    if let Some(v) = env.string("JWT_AUD") {
        config.jwt.audience = v;
    }
    if let Some(v) = env.number("JWT_TTL", &mut errors) {
        config.jwt.ttl_secs = v;
    }
    if let Some(v) = env.list("JWT_PROTECTED_PREFIXES") {
        config.jwt.protected_prefixes = v;
    }

    if let Some(v) = env.number("LOGIN_MAX_ATTEMPTS", &mut errors) {
        config.rate_limit.max_attempts = v;
    }
    if let Some(v) = env.number("LOGIN_LOCKOUT_SECS", &mut errors) {
        config.rate_limit.lockout_secs = v;
    }
    if let Some(v) = env.string("RATE_LIMIT_STORE") {
        match v.to_lowercase().as_str() {
            "memory" => config.rate_limit.store = CounterStoreKind::Memory,
            "redis" => config.rate_limit.store = CounterStoreKind::Redis,
            _ => errors.push(ValidationError::new(
                "RATE_LIMIT_STORE",
                format!("unknown counter store '{}'", v),
            )),
        }
    }
    if let Some(v) = env.string("REDIS_URL") {
        config.rate_limit.redis_url = Some(v);
    }

    if let Some(v) = env.boolean("CACHE_TAG_ENABLE") {
        config.cache_tags.enabled = v;
    }
    if let Some(v) = env.string("CACHE_TAG_HEADER_NAME") {
        config.cache_tags.header_name = v;
    }
    if let Some(v) = env.string("CACHE_TAG_LIFETIME_HEADER_NAME") {
        config.cache_tags.lifetime_header_name = v;
    }

    if let Some(v) = env.string("HEALTH_CHECK_TOKEN") {
        config.health.token = Some(v);
    }

    if let Some(v) = env.string("CSP_DEFAULT_SRC") {
        config.security.csp_default_src = v;
    }
    if let Some(v) = env.string("CSP_CONNECT_SRC") {
        config.security.csp_connect_src = v;
    }

    if let Some(v) = env.string("LOG_LEVEL") {
        config.observability.log_level = v.to_lowercase();
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn list(&self, key: &str) -> Option<Vec<String>> {
        self.string(key).map(|v| {
            v.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
    }

    fn boolean(&self, key: &str) -> Option<bool> {
        self.string(key)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    fn number<T: FromStr>(&self, key: &str, errors: &mut Vec<ValidationError>) -> Option<T> {
        let raw = self.string(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                errors.push(ValidationError::new(key, format!("'{}' is not a valid number", raw)));
                None
            }
        }
    }
}
