//! Delivery-side view of live gateways: `serverId -> instances`.

use chat_core::{ServiceEntry, ServiceSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

type ClientFactory<C> = dyn Fn(&ServiceEntry) -> C + Send + Sync;

/// Clients for one gateway instance, picked round-robin
struct Instances<C> {
    clients: Vec<C>,
    next: AtomicUsize,
}

impl<C: Clone> Instances<C> {
    fn pick(&self) -> Option<C> {
        if self.clients.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        Some(self.clients[idx].clone())
    }
}

/// Map from gateway `serverId` to RPC clients for that gateway.
///
/// The whole map is rebuilt from each snapshot and swapped in under the
/// write lock, so readers never observe a half-applied update.
pub struct InstanceDirectory<C> {
    instances: RwLock<HashMap<String, Instances<C>>>,
    factory: Box<ClientFactory<C>>,
}

impl<C: Clone + Send + Sync + 'static> InstanceDirectory<C> {
    /// Create an empty directory; `factory` builds a client for one entry
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn(&ServiceEntry) -> C + Send + Sync + 'static,
    {
        Self {
            instances: RwLock::new(HashMap::new()),
            factory: Box::new(factory),
        }
    }

    /// Replace the directory contents with `snapshot`
    pub fn apply(&self, snapshot: &ServiceSnapshot) {
        let mut next: HashMap<String, Instances<C>> = HashMap::new();
        for entry in snapshot {
            if entry.server_id.is_empty() || entry.server_type.is_empty() {
                continue;
            }
            next.entry(entry.server_id.clone())
                .or_insert_with(|| Instances {
                    clients: Vec::new(),
                    next: AtomicUsize::new(0),
                })
                .clients
                .push((self.factory)(entry));
        }

        tracing::debug!(servers = next.len(), "Instance directory updated");
        *self.instances.write() = next;
    }

    /// Client for the gateway that owns `server_id`
    pub fn client_for(&self, server_id: &str) -> Option<C> {
        self.instances.read().get(server_id).and_then(Instances::pick)
    }

    /// One client per known gateway
    pub fn all_clients(&self) -> Vec<C> {
        self.instances
            .read()
            .values()
            .filter_map(Instances::pick)
            .collect()
    }

    /// Number of known gateways
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Apply every snapshot published on `updates` until the sender goes away
    pub fn follow(self: Arc<Self>, mut updates: watch::Receiver<ServiceSnapshot>) {
        tokio::spawn(async move {
            self.apply(&updates.borrow_and_update());
            while updates.changed().await.is_ok() {
                let snapshot = updates.borrow_and_update().clone();
                self.apply(&snapshot);
            }
        });
    }
}

impl<C> std::fmt::Debug for InstanceDirectory<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceDirectory")
            .field("servers", &self.instances.read().len())
            .finish()
    }
}
