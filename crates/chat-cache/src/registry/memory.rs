//! In-process registry, used when no Redis backend is configured.

use async_trait::async_trait;
use chat_core::{InstanceResolver, RegistryResult, ServiceEntry, ServiceRegistry, ServiceSnapshot};
use parking_lot::Mutex;

/// Registry that keeps entries in memory; serves both ports
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    entries: Mutex<Vec<ServiceEntry>>,
    refreshes: Mutex<u64>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful refresh calls
    pub fn refresh_count(&self) -> u64 {
        *self.refreshes.lock()
    }
}

#[async_trait]
impl ServiceRegistry for MemoryRegistry {
    async fn register(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        let mut entries = self.entries.lock();
        if !entries.contains(entry) {
            entries.push(entry.clone());
        }
        Ok(())
    }

    async fn refresh(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        self.register(entry).await?;
        *self.refreshes.lock() += 1;
        Ok(())
    }

    async fn deregister(&self, entry: &ServiceEntry) -> RegistryResult<()> {
        self.entries.lock().retain(|e| e != entry);
        Ok(())
    }
}

#[async_trait]
impl InstanceResolver for MemoryRegistry {
    async fn resolve(&self) -> RegistryResult<ServiceSnapshot> {
        Ok(self.entries.lock().clone())
    }
}
