//! Cross-origin allow-list.
//!
//! # Design Decisions
//! - Exact string equality only: no wildcards, no subdomain inference
//! - An empty allow-list denies every origin (fail closed)
//! - Built once at startup and shared read-only

use std::collections::HashSet;

use crate::config::CorsConfig;

/// Immutable CORS policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed_origins: HashSet<String>,
    allow_headers: String,
    allow_methods: String,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            allowed_origins: config.allowed_origins.iter().cloned().collect(),
            allow_headers: config.allowed_headers.join(","),
            allow_methods: config.allowed_methods.join(","),
        }
    }

    /// Returns true iff `origin` is an exact member of a non-empty allow-list.
    pub fn is_allowed(&self, origin: &str) -> bool {
        !self.allowed_origins.is_empty() && self.allowed_origins.contains(origin)
    }

    /// Value of `Access-Control-Allow-Headers`, in configured order.
    pub fn allow_headers(&self) -> &str {
        &self.allow_headers
    }

    /// Value of `Access-Control-Allow-Methods`, in configured order.
    pub fn allow_methods(&self) -> &str {
        &self.allow_methods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(origins: &[&str]) -> CorsPolicy {
        CorsPolicy::from_config(&CorsConfig {
            allowed_origins: origins.iter().map(|s| s.to_string()).collect(),
            ..CorsConfig::default()
        })
    }

    #[test]
    fn test_empty_list_denies_everything() {
        let p = policy(&[]);
        assert!(!p.is_allowed("https://example.com"));
        assert!(!p.is_allowed(""));
    }

    #[test]
    fn test_exact_match_only() {
        let p = policy(&["https://example.com"]);
        assert!(p.is_allowed("https://example.com"));
        assert!(!p.is_allowed("https://example.com/"));
        assert!(!p.is_allowed("https://sub.example.com"));
        assert!(!p.is_allowed("http://example.com"));
        assert!(!p.is_allowed("HTTPS://EXAMPLE.COM"));
    }

    #[test]
    fn test_header_lists_keep_order() {
        let p = CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec![],
            allowed_headers: vec!["X-B".into(), "X-A".into()],
            allowed_methods: vec!["POST".into(), "GET".into()],
        });
        assert_eq!(p.allow_headers(), "X-B,X-A");
        assert_eq!(p.allow_methods(), "POST,GET");
    }
}
