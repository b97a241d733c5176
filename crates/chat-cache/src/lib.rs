//! # chat-cache
//!
//! Redis-backed service registry for gateway instances.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Registry**: TTL-refreshed gateway entries under a common key prefix
//! - **Discovery**: A polled resolver and a round-robin instance directory
//!   for the delivery tier
//!
//! ## Example
//!
//! ```ignore
//! use chat_cache::{create_shared_pool, RedisPoolConfig, RedisServiceRegistry};
//!
//! let pool = create_shared_pool(RedisPoolConfig::default())?;
//! let registry = RedisServiceRegistry::new(pool, "chat/connect", Duration::from_secs(90));
//! registry.register(&ServiceEntry::new("gateway-1", "ws", "127.0.0.1:6912")).await?;
//! ```

pub mod pool;
pub mod registry;

// Re-export pool types
pub use pool::{
    create_shared_pool, RedisPool, RedisPoolConfig, RedisPoolError, RedisResult, SharedRedisPool,
};

// Re-export registry types
pub use registry::{
    keep_registered, InstanceDirectory, MemoryRegistry, RedisInstanceResolver,
    RedisServiceRegistry, RegistrationHandle,
};
