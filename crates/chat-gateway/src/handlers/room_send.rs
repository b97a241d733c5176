//! Room send handler (raw TCP only)
//!
//! A TCP client publishes room chat over its own socket; the message is
//! relayed to the business tier, which fans it back out through the push
//! surface.

use chat_core::SendRoomRequest;
use std::sync::Arc;

use super::{HandlerError, HandlerResult};
use crate::connection::Channel;
use crate::protocol::{OpCode, TcpMessage};
use crate::server::Server;

/// Handler for TCP `RoomSend` frames
pub struct RoomSendHandler;

impl RoomSendHandler {
    pub async fn handle(
        server: &Server,
        channel: &Arc<Channel>,
        message: TcpMessage,
    ) -> HandlerResult<()> {
        if !channel.is_joined() {
            return Err(HandlerError::NotJoined);
        }

        tracing::trace!(
            conn_id = channel.conn_id(),
            user_id = %channel.user_id(),
            room_id = %message.room_id,
            "Relaying room message"
        );

        server
            .logic()
            .push_room(SendRoomRequest {
                msg: message.msg,
                from_user_id: message.from_user_id,
                from_user_name: message.from_user_name,
                room_id: message.room_id,
                op: OpCode::RoomSend.as_i32(),
            })
            .await?;
        Ok(())
    }
}
