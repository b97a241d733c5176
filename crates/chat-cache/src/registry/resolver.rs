//! Redis-backed instance discovery for the delivery tier.

use async_trait::async_trait;
use chat_core::{InstanceResolver, RegistryResult, ServiceEntry, ServiceSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::address_of;
use crate::pool::SharedRedisPool;

/// Reads every entry under the registry prefix
#[derive(Debug, Clone)]
pub struct RedisInstanceResolver {
    pool: SharedRedisPool,
    base_path: String,
}

impl RedisInstanceResolver {
    pub fn new(pool: SharedRedisPool, base_path: impl Into<String>) -> Self {
        Self {
            pool,
            base_path: base_path.into(),
        }
    }

    /// Poll the registry every `interval` and publish changed snapshots.
    ///
    /// The polling task stops once every receiver is dropped. Failed polls are
    /// logged and keep the previous snapshot.
    pub fn watch(self: Arc<Self>, interval: Duration) -> watch::Receiver<ServiceSnapshot> {
        let (tx, rx) = watch::channel(ServiceSnapshot::new());

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    () = tx.closed() => break,
                }

                match self.resolve().await {
                    Ok(snapshot) => {
                        tx.send_if_modified(|current| {
                            if *current == snapshot {
                                false
                            } else {
                                tracing::debug!(instances = snapshot.len(), "Gateway instances changed");
                                *current = snapshot;
                                true
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to resolve gateway instances"),
                }
            }
        });

        rx
    }
}

#[async_trait]
impl InstanceResolver for RedisInstanceResolver {
    async fn resolve(&self) -> RegistryResult<ServiceSnapshot> {
        let prefix = format!("{}/", self.base_path.trim_end_matches('/'));
        let stored = self.pool.entries_with_prefix(&prefix).await?;

        let mut snapshot: ServiceSnapshot = stored
            .iter()
            .filter_map(|(key, metadata)| {
                let entry = ServiceEntry::from_metadata(address_of(key), metadata);
                if entry.is_none() {
                    tracing::debug!(key = %key, metadata = %metadata, "Skipping incomplete registry entry");
                }
                entry
            })
            .collect();

        snapshot.sort_by(|a, b| {
            (&a.server_id, &a.server_type, &a.address).cmp(&(&b.server_id, &b.server_type, &b.address))
        });
        Ok(snapshot)
    }
}
