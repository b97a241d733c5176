//! Integration test utilities for the chat gateway
//!
//! Boots a gateway in-process on ephemeral ports against an in-memory
//! business tier, and provides WebSocket, raw-TCP and push clients.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
