//! # chat-gateway
//!
//! Connection gateway for real-time chat delivery.
//!
//! Clients connect over WebSocket or raw TCP and join with an auth token.
//! Connections are sharded into buckets by user id; each bucket keeps its own
//! room membership and a pool of broadcast workers. The delivery tier pushes
//! messages in through the HTTP push surface.
//!
//! ## Example
//!
//! ```ignore
//! let config = AppConfig::from_env()?;
//! chat_gateway::run(config).await?;
//! ```

pub mod broadcast;
pub mod connection;
pub mod handlers;
pub mod protocol;
pub mod rpc;
pub mod server;

pub use server::{run, serve, GatewayContext, Listeners, Server};
