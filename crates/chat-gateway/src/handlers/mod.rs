//! Client frame handlers
//!
//! Join is shared by both transports; room send exists only on raw TCP.

mod error;
mod join;
mod room_send;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{HandlerError, HandlerResult};
pub use join::JoinHandler;
pub use room_send::RoomSendHandler;
