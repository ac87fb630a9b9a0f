//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults
//!     → loader.rs (optional TOML file)
//!     → env.rs (environment overrides)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → each component receives its section by constructor
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod env;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheTagConfig, CheckKind, CorsConfig, CounterStoreKind, DependencyCheckConfig, GateConfig,
    HealthConfig, JwtConfig, ListenerConfig, LogFormat, LoginConfig, NotFoundConfig,
    ObservabilityConfig, RateLimitConfig, SecurityConfig, StoreFailurePolicy, TimeoutConfig,
    UpstreamConfig, UserConfig,
};
