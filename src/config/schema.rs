//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Upstream renderer that receives requests passing the pipeline.
    pub upstream: UpstreamConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Bearer token verification and issuance.
    pub jwt: JwtConfig,

    /// Brute-force login guard.
    pub rate_limit: RateLimitConfig,

    /// Login endpoint and its credential store.
    pub login: LoginConfig,

    /// Cache-tag header emission.
    pub cache_tags: CacheTagConfig,

    /// Liveness/readiness probes.
    pub health: HealthConfig,

    /// JSON rewrite of 404 responses.
    pub not_found: NotFoundConfig,

    /// Security hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent in-flight requests (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a request, pipeline included, in seconds.
    pub request_secs: u64,

    /// Time allowed for the upstream to answer, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_secs: 25,
        }
    }
}

/// Upstream renderer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream (e.g., "http://127.0.0.1:8000").
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".to_string(),
        }
    }
}

/// CORS configuration. Loaded once; never mutated afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins allowed to make cross-origin requests. Empty denies all.
    pub allowed_origins: Vec<String>,

    /// Request headers advertised in `Access-Control-Allow-Headers`.
    pub allowed_headers: Vec<String>,

    /// Methods advertised in `Access-Control-Allow-Methods`.
    pub allowed_methods: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string(), "OPTIONS".to_string()],
        }
    }
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Verification key (PEM for RS256/ES256, raw secret for HS256).
    /// Validation is disabled when unset or unreadable.
    pub public_key_path: Option<String>,

    /// Signing key used to issue tokens on login. Issuance is disabled when unset.
    pub private_key_path: Option<String>,

    /// Signature algorithm ("RS256", "ES256", "HS256").
    pub algorithm: String,

    /// Expected `iss` claim.
    pub issuer: String,

    /// Audience that must be present in `aud`.
    pub audience: String,

    /// Lifetime of issued tokens in seconds.
    pub ttl_secs: u64,

    /// Path prefixes subject to token validation.
    pub protected_prefixes: Vec<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            public_key_path: None,
            private_key_path: None,
            algorithm: "RS256".to_string(),
            issuer: "site-gate-auth".to_string(),
            audience: "site-gate-frontend".to_string(),
            ttl_secs: 3600,
            protected_prefixes: vec!["/api/".to_string()],
        }
    }
}

/// Where failed-attempt counters live.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CounterStoreKind {
    Memory,
    Redis,
}

/// What the limiter answers when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailurePolicy {
    /// Treat the client as not locked.
    Open,
    /// Treat the client as locked. Logins are refused with 503.
    Closed,
}

/// Brute-force guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Failures after which a client key is locked.
    pub max_attempts: u32,

    /// Lockout window in seconds, restarted on every failure.
    pub lockout_secs: u64,

    /// Counter backend.
    pub store: CounterStoreKind,

    /// Redis URL, required when `store = "redis"`.
    pub redis_url: Option<String>,

    /// Upper bound on a single counter store call, in milliseconds.
    pub store_timeout_ms: u64,

    /// Behavior on counter store errors.
    pub store_failure: StoreFailurePolicy,

    /// Derive the client key from `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,

    /// Interval between purges of expired in-memory counters, in seconds.
    pub purge_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            lockout_secs: 600,
            store: CounterStoreKind::Memory,
            redis_url: None,
            store_timeout_ms: 500,
            store_failure: StoreFailurePolicy::Open,
            trust_forwarded_for: false,
            purge_interval_secs: 60,
        }
    }
}

/// A login account.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub username: String,

    /// bcrypt hash of the password.
    pub password_hash: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub name: Option<String>,
}

/// Login endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoginConfig {
    /// Mount the login endpoint.
    pub enabled: bool,

    /// Path of the login endpoint.
    pub path: String,

    /// Path reporting who the bearer token belongs to.
    pub session_path: String,

    /// Path acknowledging a logout with 204.
    pub logout_path: String,

    /// Accounts accepted by the built-in credential store.
    pub users: Vec<UserConfig>,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/auth/login".to_string(),
            session_path: "/auth/session".to_string(),
            logout_path: "/auth/logout".to_string(),
            users: Vec::new(),
        }
    }
}

/// Cache-tag header configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheTagConfig {
    pub enabled: bool,
    pub header_name: String,
    pub lifetime_header_name: String,
}

impl Default for CacheTagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            header_name: "X-FC-Cache-Tags".to_string(),
            lifetime_header_name: "X-FC-Cache-Lifetime".to_string(),
        }
    }
}

/// Kind of readiness check.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// TCP connect to `host:port`.
    Tcp,
    /// Redis `PING` against a URL.
    Redis,
    /// HTTP `GET` expecting a 2xx.
    Http,
}

/// A dependency probed by the readiness endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DependencyCheckConfig {
    /// Name reported under `checks`.
    pub name: String,

    pub kind: CheckKind,

    /// Address, Redis URL or HTTP URL depending on `kind`.
    pub target: String,

    /// Whether a failure flips `healthy` to false.
    #[serde(default = "default_critical")]
    pub critical: bool,
}

fn default_critical() -> bool {
    true
}

/// Health probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Shared secret expected in `X-Health-Token`. Endpoints are open when unset.
    pub token: Option<String>,

    /// Timeout applied to each dependency check, in milliseconds.
    pub check_timeout_ms: u64,

    /// Dependencies probed on readiness.
    pub checks: Vec<DependencyCheckConfig>,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            token: None,
            check_timeout_ms: 1000,
            checks: Vec::new(),
        }
    }
}

/// JSON 404 rewrite configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotFoundConfig {
    /// Values of the `type` query parameter that request a JSON page.
    pub json_page_types: Vec<u32>,
}

impl Default for NotFoundConfig {
    fn default() -> Self {
        Self {
            json_page_types: vec![834],
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// CSP `default-src` directive.
    pub csp_default_src: String,
    /// CSP `connect-src` directive.
    pub csp_connect_src: String,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            csp_default_src: "'none'".to_string(),
            csp_connect_src: "'self'".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
