//! Redis-backed gateway registration.

use async_trait::async_trait;
use chat_core::{RegistryResult, ServiceEntry, ServiceRegistry};
use std::time::Duration;

use super::entry_key;
use crate::pool::SharedRedisPool;

/// Stores each entry as `{base}/{type}/{address} -> metadata` with a TTL
#[derive(Debug, Clone)]
pub struct RedisServiceRegistry {
    pool: SharedRedisPool,
    base_path: String,
    ttl: Duration,
}

impl RedisServiceRegistry {
    pub fn new(pool: SharedRedisPool, base_path: impl Into<String>, ttl: Duration) -> Self {
        Self {
            pool,
            base_path: base_path.into(),
            ttl,
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl.max(Duration::from_secs(1))
    }
}

#[async_trait]
impl ServiceRegistry for RedisServiceRegistry {
    async fn register(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        let key = entry_key(&self.base_path, entry);
        self.pool
            .put_expiring(&key, &entry.metadata(), self.ttl())
            .await?;
        tracing::info!(key = %key, server_id = %entry.server_id, "Registered gateway entry");
        Ok(())
    }

    async fn refresh(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        let key = entry_key(&self.base_path, entry);
        // The key may have expired during a Redis outage; write it back in full
        if !self.pool.extend(&key, self.ttl()).await? {
            tracing::debug!(key = %key, "Registry entry expired, re-registering");
            self.pool
                .put_expiring(&key, &entry.metadata(), self.ttl())
                .await?;
        }
        Ok(())
    }

    async fn deregister(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        let key = entry_key(&self.base_path, entry);
        self.pool.remove(&key).await?;
        tracing::info!(key = %key, "Deregistered gateway entry");
        Ok(())
    }
}
