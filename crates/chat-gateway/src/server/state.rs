//! Gateway context
//!
//! Shared state handed to every listener and RPC handler.

use chat_common::AppConfig;
use std::sync::Arc;

use super::Server;

/// Gateway application context
#[derive(Clone)]
pub struct GatewayContext {
    /// Buckets, options and the business-tier client
    server: Arc<Server>,
    /// Application configuration
    config: Arc<AppConfig>,
}

impl GatewayContext {
    pub fn new(server: Server, config: AppConfig) -> Self {
        Self {
            server: Arc::new(server),
            config: Arc::new(config),
        }
    }

    /// Get the server
    pub fn server(&self) -> &Arc<Server> {
        &self.server
    }

    /// Get the application configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

impl std::fmt::Debug for GatewayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayContext")
            .field("server", &self.server)
            .field("config", &"AppConfig")
            .finish()
    }
}
