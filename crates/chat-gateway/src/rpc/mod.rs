//! Remote interfaces
//!
//! The push surface the delivery tier calls, and the HTTP clients for the
//! business tier and for pushing into a gateway.

mod client;
mod logic;
mod middleware;
mod push;

pub use client::{PushClient, PushClientError};
pub use logic::HttpLogicClient;
pub use middleware::{apply_middleware, REQUEST_ID_HEADER};
pub use push::create_rpc_router;
