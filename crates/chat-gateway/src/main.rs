//! Chat Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p chat-gateway
//! ```
//!
//! Configuration is loaded from environment variables (and `.env`).

use chat_common::{init_tracing, init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    init_tracing_with_config(&TracingConfig::for_app(&config.app));

    info!(
        name = %config.app.name,
        env = ?config.app.env,
        server_id = %config.gateway.server_id,
        ws = %config.gateway.ws_address(),
        rpc = %config.gateway.rpc_address(),
        buckets = config.bucket.count,
        "Configuration loaded"
    );

    if let Err(e) = chat_gateway::run(config).await {
        error!(error = %e, code = e.error_code(), "Gateway failed");
        std::process::exit(1);
    }
}
