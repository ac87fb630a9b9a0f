//! Failed-attempt counter storage.
//!
//! # Responsibilities
//! - Atomic increment-with-expiry per client key
//! - Read-only lookup of live counters
//! - Unconditional removal
//!
//! # Design Decisions
//! - Every operation is a single atomic step on the backend, so a cancelled
//!   request can never leave a half-updated counter
//! - Expired counters read as absent even before they are purged
//! - In-memory counters use tokio's clock so tests can pause time

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tokio::time::Instant;

use crate::security::client_key::ClientKey;

/// Counter backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    #[error("counter store timed out")]
    Timeout,
}

/// Backend holding one counter per client key.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count of the live counter for `key`, `None` when absent or expired.
    async fn get(&self, key: &ClientKey) -> Result<Option<u32>, StoreError>;

    /// Increment the counter (creating it at 1) and set its expiry to
    /// `now + ttl`. Returns the new count.
    async fn increment(&self, key: &ClientKey, ttl: Duration) -> Result<u32, StoreError>;

    /// Delete the counter. Deleting an absent counter is not an error.
    async fn remove(&self, key: &ClientKey) -> Result<(), StoreError>;
}

/// A single failed-attempt counter.
#[derive(Debug, Clone, Copy)]
struct AttemptCounter {
    count: u32,
    expires_at: Instant,
}

impl AttemptCounter {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Process-local counter store.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<DashMap<ClientKey, AttemptCounter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop expired counters so memory stays bounded. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.is_live(now));
        before.saturating_sub(self.counters.len())
    }

    /// Number of counters currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get(&self, key: &ClientKey) -> Result<Option<u32>, StoreError> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.count))
    }

    async fn increment(&self, key: &ClientKey, ttl: Duration) -> Result<u32, StoreError> {
        let now = Instant::now();
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.counters.entry(key.clone()).or_insert(AttemptCounter {
            count: 0,
            expires_at: now,
        });
        if !entry.is_live(now) {
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.expires_at = now + ttl;
        Ok(entry.count)
    }

    async fn remove(&self, key: &ClientKey) -> Result<(), StoreError> {
        self.counters.remove(key);
        Ok(())
    }
}
