//! Brute-force guard for credential checks.
//!
//! # Responsibilities
//! - Count failed authentication attempts per client key
//! - Report a key as locked once it reaches the attempt limit
//! - Forget a key after a successful attempt or when its counter expires
//! - Reserve an attempt before credentials are checked
//!
//! # Design Decisions
//! - Every failure refreshes the lockout window
//! - A reservation is one increment: concurrent attempts from the same key
//!   each get a distinct count, so at most `max_attempts` of them proceed
//! - Storage errors never fail the request; the configured
//!   `StoreFailurePolicy` decides what `is_locked` answers
//! - Each store call is bounded by a timeout

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{RateLimitConfig, StoreFailurePolicy};
use crate::observability::metrics;
use crate::security::client_key::ClientKey;
use crate::security::store::{CounterStore, StoreError};

/// Outcome of `RateLimiter::reserve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The attempt may proceed. It counts as a failure until `reset`.
    Allowed,
    /// The key has used up its attempts for the current window.
    Locked,
    /// The store failed and the policy is `Closed`.
    Unavailable,
}

/// Per-client lockout tracker.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_attempts: u32,
    lockout: Duration,
    store_timeout: Duration,
    failure_policy: StoreFailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts,
            lockout: Duration::from_secs(config.lockout_secs),
            store_timeout: Duration::from_millis(config.store_timeout_ms),
            failure_policy: config.store_failure,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn lockout(&self) -> Duration {
        self.lockout
    }

    /// True iff a live counter for `key` has reached the attempt limit.
    pub async fn is_locked(&self, key: &ClientKey) -> bool {
        match self.bounded(self.store.get(key)).await {
            Ok(count) => count.is_some_and(|n| n >= self.max_attempts),
            Err(e) => {
                self.store_failed(key, "get", &e);
                matches!(self.failure_policy, StoreFailurePolicy::Closed)
            }
        }
    }

    /// Record one failed attempt. Returns the new count, if the store answered.
    pub async fn record_failure(&self, key: &ClientKey) -> Option<u32> {
        match self.bounded(self.store.increment(key, self.lockout)).await {
            Ok(count) => {
                if count == self.max_attempts {
                    tracing::warn!(
                        client_key = %key,
                        attempts = count,
                        lockout_secs = self.lockout.as_secs(),
                        "Client locked out"
                    );
                    metrics::record_login_lockout();
                }
                Some(count)
            }
            Err(e) => {
                self.store_failed(key, "increment", &e);
                None
            }
        }
    }

    /// Count an attempt up front and decide whether it may proceed.
    ///
    /// The attempt stays counted as a failure unless the caller resets the
    /// key after a success.
    pub async fn reserve(&self, key: &ClientKey) -> Attempt {
        match self.bounded(self.store.increment(key, self.lockout)).await {
            Ok(count) if count > self.max_attempts => {
                if count == self.max_attempts + 1 {
                    tracing::warn!(
                        client_key = %key,
                        attempts = self.max_attempts,
                        lockout_secs = self.lockout.as_secs(),
                        "Client locked out"
                    );
                    metrics::record_login_lockout();
                }
                Attempt::Locked
            }
            Ok(_) => Attempt::Allowed,
            Err(e) => {
                self.store_failed(key, "increment", &e);
                match self.failure_policy {
                    StoreFailurePolicy::Open => Attempt::Allowed,
                    StoreFailurePolicy::Closed => Attempt::Unavailable,
                }
            }
        }
    }

    /// Forget every failed attempt for `key`. Idempotent.
    pub async fn reset(&self, key: &ClientKey) {
        if let Err(e) = self.bounded(self.store.remove(key)).await {
            self.store_failed(key, "remove", &e);
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, op)
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }

    fn store_failed(&self, key: &ClientKey, operation: &'static str, error: &StoreError) {
        tracing::error!(
            client_key = %key,
            operation,
            error = %error,
            policy = ?self.failure_policy,
            "Counter store error"
        );
        metrics::record_store_error();
    }
}
