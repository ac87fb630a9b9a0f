//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → origin.rs (CORS allow-list)
//!     → token.rs (bearer token verification on protected paths)
//!     → client_key.rs → rate_limit.rs → store.rs | redis_store.rs
//!       (brute-force guard around credentials.rs on login)
//! Outgoing response:
//!     → headers.rs (CSP, nosniff)
//! ```
//!
//! # Design Decisions
//! - Fail closed on policy: empty allow-list denies, bad token rejects
//! - Fail open on storage: counter store outages follow the configured policy
//! - No trust in client input: forwarded-for only when configured

pub mod client_key;
pub mod credentials;
pub mod headers;
pub mod origin;
pub mod rate_limit;
pub mod redis_store;
pub mod store;
pub mod token;

use std::sync::Arc;

pub use client_key::{client_ip, ClientKey};
pub use credentials::{ConfigCredentialStore, CredentialStore, UserProfile};
pub use origin::CorsPolicy;
pub use rate_limit::{Attempt, RateLimiter};
pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, MemoryCounterStore, StoreError};
pub use token::{AuthError, Claims, Constraint, TokenIssuer, TokenValidator};

use crate::config::{CounterStoreKind, RateLimitConfig};
use crate::error::GateError;

/// Counter store selected by configuration.
///
/// The in-memory store is also returned separately so the caller can run
/// its purge task.
pub fn counter_store_from_config(
    config: &RateLimitConfig,
) -> Result<(Arc<dyn CounterStore>, Option<MemoryCounterStore>), GateError> {
    match config.store {
        CounterStoreKind::Memory => {
            let store = MemoryCounterStore::new();
            Ok((Arc::new(store.clone()), Some(store)))
        }
        CounterStoreKind::Redis => {
            let url = config.redis_url.as_deref().ok_or_else(|| {
                GateError::Configuration("rate_limit.redis_url is required".into())
            })?;
            let store = RedisCounterStore::new(url)
                .map_err(|e| GateError::Configuration(e.to_string()))?;
            tracing::info!("Using Redis counter store");
            Ok((Arc::new(store), None))
        }
    }
}
