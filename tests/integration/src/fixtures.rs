//! Test fixtures and request builders

use chat_core::{RoomId, Snowflake, UserId};
use chat_gateway::protocol::{Msg, OpCode, RoomCountBody, RoomInfoBody, TcpMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

/// Counter for unique user ids across tests
static USER_COUNTER: AtomicI64 = AtomicI64::new(1000);

/// A user id no other test uses
pub fn unique_user() -> UserId {
    UserId::new(USER_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// Auth token the mock business tier resolves to `user`
pub fn token_for(user: UserId) -> String {
    format!("token-{user}")
}

/// First WebSocket frame
pub fn ws_join(user: UserId, room: RoomId) -> String {
    serde_json::json!({ "authToken": token_for(user), "roomId": room }).to_string()
}

/// WebSocket join without a room
pub fn ws_join_no_room(user: UserId) -> String {
    serde_json::json!({ "authToken": token_for(user) }).to_string()
}

/// TCP `BuildTcpConn` frame payload
pub fn tcp_join(user: UserId, room: RoomId) -> TcpMessage {
    TcpMessage {
        op: OpCode::BuildTcpConn.as_i32(),
        auth_token: token_for(user),
        room_id: room,
        ..TcpMessage::default()
    }
}

/// TCP `RoomSend` frame payload
pub fn tcp_room_send(user: UserId, room: RoomId, text: &str) -> TcpMessage {
    TcpMessage {
        op: OpCode::RoomSend.as_i32(),
        auth_token: token_for(user),
        room_id: room,
        msg: text.to_string(),
        from_user_id: user,
        from_user_name: format!("user{user}"),
    }
}

/// Envelope with the sequence id left for the gateway to stamp
pub fn msg(op: OpCode, body: &str) -> Msg {
    Msg::new(op, Snowflake::default(), body)
}

/// Room online-count envelope
pub fn room_count_msg(count: usize) -> Msg {
    let body = serde_json::to_string(&RoomCountBody::new(count)).unwrap_or_default();
    msg(OpCode::RoomCountSend, &body)
}

/// Room membership-info envelope
pub fn room_info_msg(room: RoomId, members: &[(UserId, &str)]) -> Msg {
    let info: HashMap<String, String> = members
        .iter()
        .map(|(id, name)| (id.to_string(), (*name).to_string()))
        .collect();
    let body = serde_json::to_string(&RoomInfoBody::new(room, info)).unwrap_or_default();
    msg(OpCode::RoomInfoSend, &body)
}
