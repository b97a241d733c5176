//! Gateway server setup
//!
//! Binds the WebSocket, raw-TCP and push RPC listeners, serves them until
//! shutdown, and keeps this instance's registry entries alive meanwhile.

mod error;
mod server;
mod state;
mod tcp;
mod websocket;

pub use error::{ServerError, ServerResult};
pub use server::{Server, ServerBuilder, ServerStats};
pub use state::GatewayContext;
pub use tcp::{bind_tcp, serve_tcp};
pub use websocket::{create_ws_router, ws_handler};

use chat_cache::{keep_registered, RedisPool, RedisPoolConfig, RedisServiceRegistry, RegistrationHandle};
use chat_common::{AppConfig, AppError, AppResult, GatewayConfig, RegistryConfig};
use chat_core::{ServiceEntry, SnowflakeGenerator, SERVER_TYPE_TCP, SERVER_TYPE_WS};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::rpc::{create_rpc_router, HttpLogicClient};

/// Bound but not yet serving listeners
#[derive(Debug)]
pub struct Listeners {
    pub ws: TcpListener,
    pub rpc: TcpListener,
    pub tcp: Vec<TcpListener>,
}

impl Listeners {
    /// Bind every configured listener. Port 0 picks an ephemeral port.
    pub async fn bind(config: &GatewayConfig) -> ServerResult<Self> {
        let ws = bind_http(&config.ws_address()).await?;
        let rpc = bind_http(&config.rpc_address()).await?;

        let mut tcp = Vec::new();
        if let Some(tcp_config) = &config.tcp {
            for addr in config.tcp_addresses() {
                tcp.push(bind_tcp(&addr, tcp_config).await?);
            }
        }

        Ok(Self { ws, rpc, tcp })
    }

    pub fn ws_addr(&self) -> ServerResult<SocketAddr> {
        self.ws.local_addr().map_err(ServerError::Serve)
    }

    pub fn rpc_addr(&self) -> ServerResult<SocketAddr> {
        self.rpc.local_addr().map_err(ServerError::Serve)
    }

    pub fn tcp_addrs(&self) -> ServerResult<Vec<SocketAddr>> {
        self.tcp
            .iter()
            .map(|l| l.local_addr().map_err(ServerError::Serve))
            .collect()
    }
}

async fn bind_http(addr: &str) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::bind(addr, e))
}

/// Serve all listeners until `shutdown` is cancelled
pub async fn serve(
    ctx: GatewayContext,
    listeners: Listeners,
    shutdown: CancellationToken,
) -> ServerResult<()> {
    let gateway = &ctx.config().gateway;
    let acceptors = gateway.tcp.as_ref().map_or(1, |tcp| tcp.acceptors);

    tracing::info!(
        ws = %listeners.ws_addr()?,
        path = %gateway.ws_path,
        rpc = %listeners.rpc_addr()?,
        tcp = listeners.tcp.len(),
        "Gateway listening"
    );

    let ws_app = create_ws_router(&gateway.ws_path, ctx.clone());
    let rpc_app = create_rpc_router(ctx.clone());

    let ws_shutdown = shutdown.clone();
    let ws = axum::serve(listeners.ws, ws_app)
        .with_graceful_shutdown(async move { ws_shutdown.cancelled().await })
        .into_future();

    let rpc_shutdown = shutdown.clone();
    let rpc = axum::serve(listeners.rpc, rpc_app)
        .with_graceful_shutdown(async move { rpc_shutdown.cancelled().await })
        .into_future();

    let tcp = futures_util::future::join_all(listeners.tcp.into_iter().map(|listener| {
        serve_tcp(Arc::clone(ctx.server()), listener, acceptors, shutdown.clone())
    }));

    let (ws, rpc, _) = tokio::join!(ws, rpc, tcp);
    ws.map_err(ServerError::Serve)?;
    rpc.map_err(ServerError::Serve)?;
    Ok(())
}

/// Build a server from configuration, backed by the HTTP business-tier client
pub fn build_server(config: &AppConfig) -> ServerResult<Server> {
    let logic = Arc::new(HttpLogicClient::new(&config.logic)?);

    Server::builder()
        .server_id(config.gateway.server_id.clone())
        .buckets(config.bucket)
        .options(config.server)
        .logic(logic)
        .snowflake_generator(Arc::new(SnowflakeGenerator::new(config.snowflake.worker_id)))
        .build()
}

/// Registry entries for this instance: one per enabled transport, all
/// pointing at the push RPC address
pub fn registry_entries(config: &GatewayConfig, rpc_addr: SocketAddr) -> Vec<ServiceEntry> {
    let address = rpc_addr.to_string();
    let mut entries = vec![ServiceEntry::new(&config.server_id, SERVER_TYPE_WS, &address)];
    if config.tcp.is_some() {
        entries.push(ServiceEntry::new(&config.server_id, SERVER_TYPE_TCP, &address));
    }
    entries
}

fn start_registration(
    registry: &RegistryConfig,
    entries: Vec<ServiceEntry>,
) -> AppResult<RegistrationHandle> {
    let pool = RedisPool::new(RedisPoolConfig::from(registry)).map_err(AppError::cache)?;
    let backend = RedisServiceRegistry::new(Arc::new(pool), &registry.base_path, registry.ttl);

    tracing::info!(
        base_path = %registry.base_path,
        entries = entries.len(),
        "Registering gateway"
    );
    Ok(keep_registered(
        Arc::new(backend),
        entries,
        registry.refresh_interval(),
    ))
}

/// Run the complete gateway with configuration until a shutdown signal
pub async fn run(config: AppConfig) -> AppResult<()> {
    let server = build_server(&config)?;
    let listeners = Listeners::bind(&config.gateway).await?;

    let registration = match &config.registry {
        Some(registry) => {
            let entries = registry_entries(&config.gateway, listeners.rpc_addr()?);
            Some(start_registration(registry, entries)?)
        }
        None => {
            tracing::info!("No registry configured, skipping registration");
            None
        }
    };

    let ctx = GatewayContext::new(server, config);
    let shutdown = CancellationToken::new();
    let mut serving = tokio::spawn(serve(ctx, listeners, shutdown.clone()));

    let early_exit = tokio::select! {
        () = shutdown_signal() => None,
        result = &mut serving => Some(result),
    };

    // Leave the registry first so the delivery tier stops routing here
    if let Some(handle) = registration {
        handle.shutdown().await;
    }
    shutdown.cancel();

    let result = match early_exit {
        Some(result) => result,
        None => serving.await,
    };
    result.map_err(AppError::internal)??;

    tracing::info!("Gateway shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        () = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
