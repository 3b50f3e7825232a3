use crate::cache::Cache;
use crate::errors::AppResult;

const COOLDOWN_KEY_PREFIX: &str = "bid:cooldown";

/// Per-user bid rate limiter backed by the cache gateway.
///
/// The gate is advisory and not atomic with the bid transaction: the check
/// runs before the transaction and the key is set only after a successful
/// commit, so two near-simultaneous requests from one user can both pass.
/// That ordering is part of the contract and must not be "fixed" here.
#[derive(Clone)]
pub struct CooldownGate<C> {
    cache: C,
    ttl_secs: u64,
}

impl<C: Cache> CooldownGate<C> {
    pub fn new(cache: C, ttl_secs: u64) -> Self {
        Self { cache, ttl_secs }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    fn key(user_id: i64) -> String {
        format!("{}:{}", COOLDOWN_KEY_PREFIX, user_id)
    }

    pub async fn is_on_cooldown(&self, user_id: i64) -> AppResult<bool> {
        self.cache.exists(&Self::key(user_id)).await
    }

    pub async fn set_cooldown(&self, user_id: i64) -> AppResult<()> {
        self.cache.set(&Self::key(user_id), "1", self.ttl_secs).await
    }

    /// Drop the user's cooldown key, active or not.
    pub async fn clear(&self, user_id: i64) -> AppResult<()> {
        self.cache.delete(&Self::key(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemCache;

    #[tokio::test]
    async fn set_then_check_then_clear() {
        let gate = CooldownGate::new(MemCache::new(), 5);

        assert!(!gate.is_on_cooldown(7).await.unwrap());
        gate.set_cooldown(7).await.unwrap();
        assert!(gate.is_on_cooldown(7).await.unwrap());

        // Another user is unaffected.
        assert!(!gate.is_on_cooldown(8).await.unwrap());

        gate.clear(7).await.unwrap();
        assert!(!gate.is_on_cooldown(7).await.unwrap());
    }
}
