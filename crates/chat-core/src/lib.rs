//! # chat-core
//!
//! Domain layer for the connection gateway: user and room identifiers,
//! time-ordered sequence ids, and the traits through which the gateway talks
//! to the business tier and the service registry.
//! This crate has zero dependencies on infrastructure (sockets, Redis, HTTP).

pub mod error;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use error::{LogicError, RegistryError};
pub use traits::{
    ConnectRequest, DisconnectRequest, InstanceResolver, LogicResult, LogicService,
    RegistryResult, SendRoomRequest, ServiceEntry, ServiceRegistry, ServiceSnapshot,
    SERVER_TYPE_TCP, SERVER_TYPE_WS,
};
pub use value_objects::{
    IdParseError, RoomId, Snowflake, SnowflakeGenerator, SnowflakeParseError, UserId, MAX_WORKER_ID,
};
