//! Redis-backed counter store, shared across gateway instances.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use crate::security::client_key::ClientKey;
use crate::security::store::{CounterStore, StoreError};

const KEY_PREFIX: &str = "site_gate:login_attempts";

/// Counter store using `INCR` + `EXPIRE` inside a `MULTI` block.
///
/// The connection is established lazily so an unreachable Redis at boot
/// degrades to store errors instead of aborting startup.
pub struct RedisCounterStore {
    client: redis::Client,
    manager: OnceCell<ConnectionManager>,
}

impl RedisCounterStore {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            manager: OnceCell::new(),
        })
    }

    fn make_key(key: &ClientKey) -> String {
        format!("{}:{}", KEY_PREFIX, key)
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .manager
            .get_or_try_init(|| async {
                let manager = ConnectionManager::new(self.client.clone()).await?;
                tracing::info!("Connected to Redis counter store");
                Ok::<_, redis::RedisError>(manager)
            })
            .await
            .map_err(unavailable)?;
        Ok(manager.clone())
    }
}

fn unavailable(e: redis::RedisError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn get(&self, key: &ClientKey) -> Result<Option<u32>, StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("GET")
            .arg(Self::make_key(key))
            .query_async::<_, Option<u32>>(&mut conn)
            .await
            .map_err(unavailable)
    }

    async fn increment(&self, key: &ClientKey, ttl: Duration) -> Result<u32, StoreError> {
        let mut conn = self.connection().await?;
        let redis_key = Self::make_key(key);
        let (count,): (u32,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(&redis_key)
            .cmd("EXPIRE")
            .arg(&redis_key)
            .arg(ttl.as_secs().max(1))
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(count)
    }

    async fn remove(&self, key: &ClientKey) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("DEL")
            .arg(Self::make_key(key))
            .query_async::<_, i64>(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_url_is_rejected() {
        assert!(RedisCounterStore::new("not a url").is_err());
    }

    #[test]
    fn test_keys_are_namespaced() {
        let key = ClientKey::from_ip("10.0.0.5".parse().unwrap());
        let redis_key = RedisCounterStore::make_key(&key);
        assert!(redis_key.starts_with("site_gate:login_attempts:"));
        assert!(redis_key.ends_with(key.as_str()));
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_store_error() {
        let store = RedisCounterStore::new("redis://127.0.0.1:1/").unwrap();
        let key = ClientKey::from_ip("10.0.0.5".parse().unwrap());
        assert!(matches!(
            store.get(&key).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
