//! Gateway service registry and delivery-side discovery.

mod directory;
mod keepalive;
mod memory;
mod redis_registry;
mod resolver;

pub use directory::InstanceDirectory;
pub use keepalive::{keep_registered, RegistrationHandle};
pub use memory::MemoryRegistry;
pub use redis_registry::RedisServiceRegistry;
pub use resolver::RedisInstanceResolver;

/// Registry key for an entry: `{base}/{server_type}/{address}`
pub(crate) fn entry_key(base_path: &str, entry: &chat_core::ServiceEntry) -> String {
    format!(
        "{}/{}/{}",
        base_path.trim_end_matches('/'),
        entry.server_type,
        entry.address
    )
}

/// Address part of a registry key (everything after the last `/`)
pub(crate) fn address_of(key: &str) -> &str {
    key.rsplit_once('/').map_or(key, |(_, addr)| addr)
}
