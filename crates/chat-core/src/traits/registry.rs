//! Service registry ports
//!
//! A gateway publishes one [`ServiceEntry`] per transport it serves. The
//! delivery tier reads them back through an [`InstanceResolver`] to build its
//! per-instance RPC client pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Server type marker for WebSocket gateways
pub const SERVER_TYPE_WS: &str = "ws";
/// Server type marker for raw-TCP gateways
pub const SERVER_TYPE_TCP: &str = "tcp";

/// One registered RPC endpoint of a gateway instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub server_id: String,
    pub server_type: String,
    /// `host:port` of the push RPC listener
    pub address: String,
}

impl ServiceEntry {
    pub fn new(
        server_id: impl Into<String>,
        server_type: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            server_type: server_type.into(),
            address: address.into(),
        }
    }

    /// Registry metadata in `serverId=<id>&serverType=<type>` form
    pub fn metadata(&self) -> String {
        format!("serverId={}&serverType={}", self.server_id, self.server_type)
    }

    /// Rebuild an entry from its address and metadata string.
    ///
    /// Returns `None` when either `serverId` or `serverType` is missing or empty.
    pub fn from_metadata(address: impl Into<String>, metadata: &str) -> Option<Self> {
        let mut server_id = None;
        let mut server_type = None;

        for pair in metadata.split('&') {
            match pair.split_once('=') {
                Some(("serverId", v)) if !v.is_empty() => server_id = Some(v),
                Some(("serverType", v)) if !v.is_empty() => server_type = Some(v),
                _ => {}
            }
        }

        Some(Self::new(server_id?, server_type?, address))
    }
}

/// Every instance currently registered, in registry order
pub type ServiceSnapshot = Vec<ServiceEntry>;

/// Write side: a gateway announcing itself
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Publish the entry
    async fn register(&self, entry: &ServiceEntry) -> RegistryResult<()>;

    /// Extend the entry's lifetime; called periodically while serving
    async fn refresh(&self, entry: &ServiceEntry) -> RegistryResult<()>;

    /// Remove the entry on graceful shutdown
    async fn deregister(&self, entry: &ServiceEntry) -> RegistryResult<()>;
}

/// Read side: the delivery tier discovering gateways
#[async_trait]
pub trait InstanceResolver: Send + Sync {
    /// Current set of registered instances
    async fn resolve(&self) -> RegistryResult<ServiceSnapshot>;
}
