//! Pooled Redis access for the gateway registry.
//!
//! Exposes only the handful of key operations the registry needs: expiring
//! writes, TTL extension, deletion, and a prefix listing.

use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 100;

#[derive(Debug, Clone)]
pub struct RedisPoolConfig {
    /// e.g. `redis://:password@host:6379/0`
    pub url: String,
    pub max_connections: usize,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            max_connections: 4,
        }
    }
}

impl From<&chat_common::RegistryConfig> for RedisPoolConfig {
    fn from(registry: &chat_common::RegistryConfig) -> Self {
        Self {
            url: registry.redis_url.clone(),
            max_connections: registry.max_connections,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RedisPoolError {
    #[error("Invalid Redis pool settings: {0}")]
    Config(#[from] deadpool_redis::CreatePoolError),

    #[error("No Redis connection available: {0}")]
    Checkout(#[from] deadpool_redis::PoolError),

    #[error("Redis command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("TTL must be at least one second, got {0:?}")]
    Ttl(Duration),
}

impl From<RedisPoolError> for chat_core::RegistryError {
    fn from(err: RedisPoolError) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type RedisResult<T> = Result<T, RedisPoolError>;

/// Lazily connected pool; the first command opens the first connection
#[derive(Clone)]
pub struct RedisPool {
    pool: Pool,
}

impl std::fmt::Debug for RedisPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.pool.status();
        f.debug_struct("RedisPool")
            .field("size", &status.size)
            .field("available", &status.available)
            .finish()
    }
}

impl RedisPool {
    pub fn new(config: RedisPoolConfig) -> RedisResult<Self> {
        let mut settings = Config::from_url(&config.url);
        settings.pool = Some(PoolConfig::new(config.max_connections));
        let pool = settings.create_pool(Some(Runtime::Tokio1))?;

        tracing::info!(
            host = %redacted(&config.url),
            max_connections = config.max_connections,
            "Redis pool ready"
        );
        Ok(Self { pool })
    }

    async fn conn(&self) -> RedisResult<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    /// `SET key value EX ttl`
    pub async fn put_expiring(&self, key: &str, value: &str, ttl: Duration) -> RedisResult<()> {
        let secs = whole_secs(ttl)?;
        self.conn()
            .await?
            .set_ex::<_, _, ()>(key, value, secs)
            .await?;
        Ok(())
    }

    /// Push the key's expiry out to `ttl` from now; `false` if the key is gone
    pub async fn extend(&self, key: &str, ttl: Duration) -> RedisResult<bool> {
        let secs = i64::try_from(whole_secs(ttl)?).map_err(|_| RedisPoolError::Ttl(ttl))?;
        let extended: bool = self.conn().await?.expire(key, secs).await?;
        Ok(extended)
    }

    pub async fn remove(&self, key: &str) -> RedisResult<()> {
        self.conn().await?.del::<_, ()>(key).await?;
        Ok(())
    }

    /// Every `(key, value)` whose key starts with `prefix`.
    ///
    /// Keys that expire between the scan and the read are left out.
    pub async fn entries_with_prefix(&self, prefix: &str) -> RedisResult<Vec<(String, String)>> {
        let mut conn = self.conn().await?;
        let pattern = format!("{prefix}*");

        let mut keys = Vec::new();
        let mut cursor = 0_u64;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may repeat keys across rounds
        keys.sort_unstable();
        keys.dedup();
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let values: Vec<Option<String>> = conn.mget(&keys).await?;
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }
}

pub type SharedRedisPool = Arc<RedisPool>;

pub fn create_shared_pool(config: RedisPoolConfig) -> RedisResult<SharedRedisPool> {
    RedisPool::new(config).map(Arc::new)
}

fn whole_secs(ttl: Duration) -> RedisResult<u64> {
    match ttl.as_secs() {
        0 => Err(RedisPoolError::Ttl(ttl)),
        secs => Ok(secs),
    }
}

/// Host part of a Redis URL, without credentials
fn redacted(url: &str) -> &str {
    url.rsplit_once('@').map_or(url, |(_, host)| host)
}
