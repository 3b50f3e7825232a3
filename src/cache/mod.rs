use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::errors::AppResult;

/// Key/value store with per-key expiry.
///
/// Only the bid cooldown runs through this gateway; it is advisory and
/// carries no correctness burden for balances.
#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;
    /// `ttl_secs == 0` stores the key without expiry.
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()>;
    async fn exists(&self, key: &str) -> AppResult<bool>;
    async fn delete(&self, key: &str) -> AppResult<()>;
}

/// Redis-backed cache over a shared multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: MultiplexedConnection,
}

impl RedisCache {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_tokio_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()> {
        let mut conn = self.conn.clone();
        if ttl_secs == 0 {
            let _: () = conn.set(key, value).await?;
        } else {
            let _: () = conn.set_ex(key, value, ttl_secs).await?;
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(key).await?)
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}

/// In-memory cache implementing the same contract, used by the tests.
#[derive(Clone, Default)]
pub struct MemCache {
    entries: Arc<Mutex<HashMap<String, MemEntry>>>,
}

#[derive(Clone)]
struct MemEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemEntry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[async_trait]
impl Cache for MemCache {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> AppResult<()> {
        let expires_at = (ttl_secs > 0).then(|| Instant::now() + Duration::from_secs(ttl_secs));
        self.entries.lock().await.insert(
            key.to_owned(),
            MemEntry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_delete_round_trip() {
        let cache = MemCache::new();

        cache.set("k", "v", 0).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn expired_keys_read_as_absent() {
        let cache = MemCache::new();
        cache.set("k", "v", 5).await.unwrap();

        // Force the entry past its deadline.
        cache
            .entries
            .lock()
            .await
            .get_mut("k")
            .unwrap()
            .expires_at = Some(Instant::now());

        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
