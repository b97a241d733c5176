//! Join handler
//!
//! Admits a connection: the business tier resolves the auth token to a user
//! id, then the channel is registered in the bucket owning that user.

use chat_core::{ConnectRequest, RoomId, UserId};
use std::sync::Arc;

use super::{HandlerError, HandlerResult};
use crate::connection::Channel;
use crate::server::Server;

/// Handler for the first WebSocket frame and for TCP `BuildTcpConn`
pub struct JoinHandler;

impl JoinHandler {
    pub async fn handle(
        server: &Server,
        channel: &Arc<Channel>,
        auth_token: &str,
        room_id: RoomId,
    ) -> HandlerResult<UserId> {
        if auth_token.is_empty() {
            return Err(HandlerError::MissingAuthToken);
        }

        let user_id = server
            .logic()
            .connect(ConnectRequest {
                auth_token: auth_token.to_string(),
                room_id,
                server_id: server.server_id().to_string(),
            })
            .await?;
        if user_id.is_zero() {
            return Err(HandlerError::Rejected);
        }

        server.bucket(user_id).put(user_id, room_id, channel)?;

        tracing::info!(
            conn_id = channel.conn_id(),
            user_id = %user_id,
            room_id = %room_id,
            "Connection joined"
        );
        Ok(user_id)
    }
}
