//! Message envelope and request bodies

use chat_core::{RoomId, Snowflake, SnowflakeGenerator, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::opcodes::{OpCode, MSG_VERSION, SUCCESS_REPLY_CODE, SUCCESS_REPLY_MSG};

/// Message envelope delivered to clients.
///
/// Only `body` goes out on the client transport; the other fields are routing metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Msg {
    pub ver: i32,
    pub op: OpCode,
    /// Globally unique, time-ordered id assigned by the sender; zero when
    /// the sender leaves stamping to the gateway
    #[serde(default)]
    pub seq: Snowflake,
    pub body: String,
}

impl Msg {
    pub fn new(op: OpCode, seq: Snowflake, body: impl Into<String>) -> Self {
        Self {
            ver: MSG_VERSION,
            op,
            seq,
            body: body.into(),
        }
    }

    /// Build a message with a fresh sequence id
    pub fn generate(generator: &SnowflakeGenerator, op: OpCode, body: impl Into<String>) -> Self {
        Self::new(op, generator.generate(), body)
    }
}

/// `pushSingle` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMsgRequest {
    pub user_id: UserId,
    pub msg: Msg,
}

/// `pushRoom`, `pushRoomCount` and `pushRoomInfo` request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRoomMsgRequest {
    pub room_id: RoomId,
    pub msg: Msg,
}

/// Acknowledgement returned by every push call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessReply {
    pub code: i32,
    pub msg: String,
}

impl SuccessReply {
    pub fn ok() -> Self {
        Self {
            code: SUCCESS_REPLY_CODE,
            msg: SUCCESS_REPLY_MSG.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == SUCCESS_REPLY_CODE
    }
}

/// First text frame of a WebSocket connection
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "no_room")]
    pub room_id: RoomId,
}

fn no_room() -> RoomId {
    RoomId::NONE
}

/// Payload of a raw-TCP frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TcpMessage {
    /// Raw op code; unknown values are ignored by the gateway
    pub op: i32,
    pub auth_token: String,
    pub room_id: RoomId,
    pub msg: String,
    pub from_user_id: UserId,
    pub from_user_name: String,
}

/// Body of a room online-count update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCountBody {
    pub op: OpCode,
    pub count: usize,
}

impl RoomCountBody {
    pub fn new(count: usize) -> Self {
        Self {
            op: OpCode::RoomCountSend,
            count,
        }
    }
}

/// Body of a room membership-info update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfoBody {
    pub op: OpCode,
    pub room_id: RoomId,
    pub count: usize,
    /// user id (as string) -> user name
    pub room_user_info: HashMap<String, String>,
}

impl RoomInfoBody {
    pub fn new(room_id: RoomId, room_user_info: HashMap<String, String>) -> Self {
        Self {
            op: OpCode::RoomInfoSend,
            room_id,
            count: room_user_info.len(),
            room_user_info,
        }
    }
}
