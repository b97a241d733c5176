//! Business tier port - join, leave and room-send remote calls

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LogicError;
use crate::value_objects::{RoomId, UserId};

/// Result type for business tier calls
pub type LogicResult<T> = Result<T, LogicError>;

/// Join request: the gateway asks the business tier to admit a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub auth_token: String,
    pub room_id: RoomId,
    /// Identifier of the gateway instance that now owns the connection
    pub server_id: String,
}

/// Leave request, sent after the channel was removed from its bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectRequest {
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Room message relayed from a raw-TCP client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRoomRequest {
    pub msg: String,
    pub from_user_id: UserId,
    pub from_user_name: String,
    pub room_id: RoomId,
    pub op: i32,
}

/// Remote business tier as seen by the gateway
#[async_trait]
pub trait LogicService: Send + Sync {
    /// Validate the auth token and record the session.
    ///
    /// Returns the user id; `UserId(0)` means the session was rejected.
    async fn connect(&self, req: ConnectRequest) -> LogicResult<UserId>;

    /// Remove the user from the room. Callers log failures and never retry.
    async fn disconnect(&self, req: DisconnectRequest) -> LogicResult<()>;

    /// Publish a room message on behalf of a TCP client
    async fn push_room(&self, req: SendRoomRequest) -> LogicResult<()>;
}
