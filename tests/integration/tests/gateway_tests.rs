//! End-to-end tests against an in-process gateway
//!
//! Each test starts its own gateway on ephemeral ports, backed by the mock
//! business tier from `integration_tests::helpers`.

use std::sync::Arc;
use std::time::Duration;

use chat_cache::{keep_registered, InstanceDirectory, MemoryRegistry};
use chat_core::{DisconnectRequest, InstanceResolver, RoomId, ServiceEntry, UserId};
use chat_gateway::protocol::{Msg, OpCode, RoomCountBody, RoomInfoBody, TcpMessage};
use chat_gateway::rpc::PushClient;
use chat_gateway::server::registry_entries;
use integration_tests::*;
use serde_json::Value;

const ROOM: RoomId = RoomId::new(1);

// ============================================================================
// WebSocket
// ============================================================================

#[tokio::test]
async fn test_ws_join_then_push_single() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    gw.push
        .push_single(user, msg(OpCode::SingleSend, "hello there"))
        .await
        .unwrap();

    assert_eq!(client.recv_text().await.unwrap(), "hello there");

    let connects = gw.logic.connects();
    assert_eq!(connects.len(), 1);
    assert_eq!(connects[0].room_id, ROOM);
    assert_eq!(connects[0].server_id, "gateway-it");
}

#[tokio::test]
async fn test_ws_join_without_room_still_gets_single_push() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.ws_client(ws_join_no_room(user)).await.unwrap();
    gw.wait_joined(user).await.unwrap();
    assert_eq!(gw.room_size(ROOM), 0);

    gw.push
        .push_single(user, msg(OpCode::SingleSend, "direct"))
        .await
        .unwrap();
    assert_eq!(client.recv_text().await.unwrap(), "direct");
}

#[tokio::test]
async fn test_ws_close_without_room_skips_leave() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let client = gw.ws_client(ws_join_no_room(user)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    client.close().await.unwrap();
    gw.wait_left(user).await.unwrap();

    // Teardown is done once the user is gone; give a stray leave call time to land
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(gw.logic.disconnects().is_empty());
}

#[tokio::test]
async fn test_push_single_to_unknown_user_is_acknowledged() {
    let gw = TestGateway::start().await.unwrap();

    let result = gw
        .push
        .push_single(unique_user(), msg(OpCode::SingleSend, "nobody home"))
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_push_room_reaches_every_member_across_buckets() {
    let gw = TestGateway::start().await.unwrap();
    let users: Vec<UserId> = (0..4).map(|_| unique_user()).collect();

    let mut clients = Vec::new();
    for user in &users {
        clients.push(gw.ws_client(ws_join(*user, ROOM)).await.unwrap());
    }
    gw.wait_room_size(ROOM, users.len()).await.unwrap();

    let outsider = unique_user();
    let mut other_room = gw.ws_client(ws_join(outsider, RoomId::new(2))).await.unwrap();
    gw.wait_joined(outsider).await.unwrap();

    gw.push
        .push_room(ROOM, msg(OpCode::RoomSend, "to the room"))
        .await
        .unwrap();

    for client in &mut clients {
        assert_eq!(client.recv_text().await.unwrap(), "to the room");
    }

    gw.push
        .push_room(RoomId::new(2), msg(OpCode::RoomSend, "second room"))
        .await
        .unwrap();
    // Only the member of room 2 sees this one
    assert_eq!(other_room.recv_text().await.unwrap(), "second room");
}

#[tokio::test]
async fn test_room_count_and_info_updates() {
    let gw = TestGateway::start().await.unwrap();
    let alice = unique_user();
    let bob = unique_user();

    let mut a = gw.ws_client(ws_join(alice, ROOM)).await.unwrap();
    let mut b = gw.ws_client(ws_join(bob, ROOM)).await.unwrap();
    gw.wait_room_size(ROOM, 2).await.unwrap();

    gw.push.push_room_count(ROOM, room_count_msg(2)).await.unwrap();
    for client in [&mut a, &mut b] {
        let body: RoomCountBody = serde_json::from_str(&client.recv_text().await.unwrap()).unwrap();
        assert_eq!(body, RoomCountBody::new(2));
    }

    gw.push
        .push_room_info(ROOM, room_info_msg(ROOM, &[(alice, "alice"), (bob, "bob")]))
        .await
        .unwrap();
    let body: RoomInfoBody = serde_json::from_str(&a.recv_text().await.unwrap()).unwrap();
    assert_eq!(body.op, OpCode::RoomInfoSend);
    assert_eq!(body.count, 2);
    assert_eq!(body.room_user_info.get(&bob.to_string()).map(String::as_str), Some("bob"));
}

#[tokio::test]
async fn test_ws_rejected_token_closes_socket() {
    let gw = TestGateway::start().await.unwrap();

    let join = serde_json::json!({ "authToken": "not-a-token", "roomId": ROOM }).to_string();
    let mut client = gw.ws_client(join).await.unwrap();

    assert!(client.expect_closed().await);
    assert!(gw.logic.disconnects().is_empty());
}

#[tokio::test]
async fn test_ws_missing_token_closes_socket() {
    let gw = TestGateway::start().await.unwrap();

    let join = serde_json::json!({ "roomId": ROOM }).to_string();
    let mut client = gw.ws_client(join).await.unwrap();

    assert!(client.expect_closed().await);
    assert!(gw.logic.connects().is_empty());
}

#[tokio::test]
async fn test_ws_frames_after_join_are_ignored() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    client.send_text("chatter".into()).await.unwrap();
    client.send_text("more chatter".into()).await.unwrap();

    gw.push
        .push_single(user, msg(OpCode::SingleSend, "still here"))
        .await
        .unwrap();
    assert_eq!(client.recv_text().await.unwrap(), "still here");
    assert_eq!(gw.logic.connects().len(), 1);
}

#[tokio::test]
async fn test_ws_close_leaves_room_and_notifies_business_tier() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    client.close().await.unwrap();
    gw.wait_left(user).await.unwrap();
    gw.wait_until(|| !gw.logic.disconnects().is_empty())
        .await
        .unwrap();

    let disconnects = gw.logic.disconnects();
    assert_eq!(disconnects.len(), 1);
    assert_eq!(disconnects[0].user_id, user);
    assert_eq!(disconnects[0].room_id, ROOM);
    assert!(gw.server.bucket(user).lookup_room(ROOM).is_none());
}

#[tokio::test]
async fn test_ws_rejoin_replaces_previous_session() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let first = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();
    first.close().await.unwrap();
    gw.wait_left(user).await.unwrap();

    let mut second = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    gw.push
        .push_room(ROOM, msg(OpCode::RoomSend, "welcome back"))
        .await
        .unwrap();
    assert_eq!(second.recv_text().await.unwrap(), "welcome back");
}

// ============================================================================
// Raw TCP
// ============================================================================

#[tokio::test]
async fn test_tcp_join_then_push_single() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.tcp_client().await.unwrap();
    client.send(&tcp_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    gw.push
        .push_single(user, msg(OpCode::SingleSend, "over tcp"))
        .await
        .unwrap();
    assert_eq!(client.recv_text().await.unwrap(), "over tcp");
}

#[tokio::test]
async fn test_tcp_room_send_is_relayed_to_room() {
    let gw = TestGateway::start().await.unwrap();
    let sender = unique_user();
    let listener = unique_user();

    let mut tcp = gw.tcp_client().await.unwrap();
    tcp.send(&tcp_join(sender, ROOM)).await.unwrap();
    let mut ws = gw.ws_client(ws_join(listener, ROOM)).await.unwrap();
    gw.wait_room_size(ROOM, 2).await.unwrap();

    tcp.send(&tcp_room_send(sender, ROOM, "hi all")).await.unwrap();

    let sends = {
        gw.wait_until(|| !gw.logic.room_sends().is_empty()).await.unwrap();
        gw.logic.room_sends()
    };
    assert_eq!(sends[0].msg, "hi all");
    assert_eq!(sends[0].from_user_id, sender);
    assert_eq!(sends[0].op, OpCode::RoomSend.as_i32());

    // The mock business tier fans the message back out through push-room
    for body in [ws.recv_text().await.unwrap(), tcp.recv_text().await.unwrap()] {
        let value: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["msg"], "hi all");
        assert_eq!(value["fromUserName"], format!("user{sender}"));
    }
}

#[tokio::test]
async fn test_tcp_room_send_before_join_is_dropped() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.tcp_client().await.unwrap();
    client.send(&tcp_room_send(user, ROOM, "too early")).await.unwrap();
    client.send(&tcp_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    assert!(gw.logic.room_sends().is_empty());
}

#[tokio::test]
async fn test_tcp_invalid_frame_closes_connection() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();

    let mut client = gw.tcp_client().await.unwrap();
    client.send(&tcp_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    let no_token = TcpMessage {
        op: OpCode::RoomSend.as_i32(),
        room_id: ROOM,
        msg: "anonymous".into(),
        ..TcpMessage::default()
    };
    client.send(&no_token).await.unwrap();

    assert!(client.expect_closed().await);
    gw.wait_left(user).await.unwrap();
    gw.wait_until(|| gw.logic.disconnects().len() == 1)
        .await
        .unwrap();
}

#[test]
fn test_tcp_disabled_without_ports() {
    let config = test_config(&[("GATEWAY_TCP_PORTS", "")]).unwrap();
    assert!(config.gateway.tcp.is_none());
    assert_eq!(registry_entries(&config.gateway, "127.0.0.1:1".parse().unwrap()).len(), 1);
}

// ============================================================================
// Heartbeats
// ============================================================================

/// Fast ping cadence so deadlines pass within a test
const HEARTBEAT: &[(&str, &str)] = &[("PING_PERIOD_SECS", "1"), ("PONG_WAIT_SECS", "2")];

#[tokio::test]
async fn test_ws_idle_connection_is_pinged() {
    let gw = TestGateway::start_with(HEARTBEAT).await.unwrap();
    let user = unique_user();

    let mut client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    assert_eq!(client.recv_ping().await.unwrap(), b"ping msg");
}

#[tokio::test]
async fn test_ws_silent_client_is_dropped_after_pong_wait() {
    let gw = TestGateway::start_with(HEARTBEAT).await.unwrap();
    let user = unique_user();

    // Never polled again, so the server's pings go unanswered
    let _client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    gw.wait_until_for(Duration::from_secs(5), || {
        gw.server.bucket(user).lookup_by_user(user).is_none()
    })
    .await
    .unwrap();
    gw.wait_until(|| !gw.logic.disconnects().is_empty())
        .await
        .unwrap();

    assert_eq!(
        gw.logic.disconnects(),
        vec![DisconnectRequest {
            user_id: user,
            room_id: ROOM,
        }]
    );
    assert_eq!(gw.room_size(ROOM), 0);
}

#[tokio::test]
async fn test_tcp_idle_connection_receives_ping_frame() {
    let gw = TestGateway::start_with(HEARTBEAT).await.unwrap();
    let user = unique_user();

    let mut client = gw.tcp_client().await.unwrap();
    client.send(&tcp_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    // The client codec only yields payloads of well-formed `v1` frames
    assert_eq!(client.recv_text().await.unwrap(), "ping msg");
    assert!(gw.server.bucket(user).lookup_by_user(user).is_some());
}

// ============================================================================
// RPC surface
// ============================================================================

#[tokio::test]
async fn test_health_and_stats() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();
    let _client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    let http = reqwest::Client::new();

    let health: Value = http
        .get(gw.rpc_url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["serverId"], "gateway-it");

    let stats: Value = http
        .get(gw.rpc_url("/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["buckets"], 2);
    assert_eq!(stats["channels"], 1);
    assert_eq!(stats["rooms"], 1);
}

#[tokio::test]
async fn test_push_reply_and_request_id() {
    let gw = TestGateway::start().await.unwrap();

    let response = reqwest::Client::new()
        .post(gw.rpc_url("/rpc/push-room"))
        .header("x-request-id", "it-123")
        .json(&serde_json::json!({ "roomId": 9, "msg": { "ver": 1, "op": 3, "body": "x" } }))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("it-123")
    );
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["code"], 0);
}

#[tokio::test]
async fn test_malformed_push_rejected() {
    let gw = TestGateway::start().await.unwrap();

    let response = reqwest::Client::new()
        .post(gw.rpc_url("/rpc/push-single"))
        .json(&serde_json::json!({ "userId": "abc" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn test_delivery_tier_finds_gateway_through_registry() {
    let gw = TestGateway::start().await.unwrap();
    let user = unique_user();
    let mut client = gw.ws_client(ws_join(user, ROOM)).await.unwrap();
    gw.wait_joined(user).await.unwrap();

    let config = test_config(&[]).unwrap();
    let entries = registry_entries(&config.gateway, gw.rpc_addr);
    assert_eq!(entries.len(), 2);

    let registry = Arc::new(MemoryRegistry::new());
    let registration = keep_registered(
        Arc::clone(&registry) as _,
        entries.clone(),
        Duration::from_millis(20),
    );
    gw.wait_until(|| registry.refresh_count() >= 2).await.unwrap();

    let http = reqwest::Client::new();
    let directory = InstanceDirectory::new(move |entry: &ServiceEntry| {
        PushClient::with_client(http.clone(), format!("http://{}", entry.address))
    });
    directory.apply(&registry.resolve().await.unwrap());

    let push = directory.client_for("gateway-it").expect("gateway registered");
    push.push_single(user, Msg::new(OpCode::SingleSend, Default::default(), "found you"))
        .await
        .unwrap();
    assert_eq!(client.recv_text().await.unwrap(), "found you");

    registration.shutdown().await;
    assert!(registry.resolve().await.unwrap().is_empty());
}
