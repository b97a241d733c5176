//! Push RPC handlers
//!
//! Every push returns the same success acknowledgement whether or not a
//! local recipient was found.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use super::middleware::apply_middleware;
use crate::protocol::{PushMsgRequest, PushRoomMsgRequest, SuccessReply};
use crate::server::{GatewayContext, ServerStats};

/// Router for the push surface, with middleware applied
pub fn create_rpc_router(ctx: GatewayContext) -> Router {
    let routes = Router::new()
        .route("/rpc/push-single", post(push_single))
        .route("/rpc/push-room", post(push_room))
        .route("/rpc/push-room-count", post(push_room_count))
        .route("/rpc/push-room-info", post(push_room_info))
        .route("/health", get(health_check))
        .route("/stats", get(stats));

    apply_middleware(routes).with_state(ctx)
}

/// POST /rpc/push-single
async fn push_single(
    State(ctx): State<GatewayContext>,
    Json(req): Json<PushMsgRequest>,
) -> Json<SuccessReply> {
    if ctx.server().push_single(req.user_id, req.msg).is_none() {
        tracing::trace!(user_id = %req.user_id, "Push target not connected here");
    }
    Json(SuccessReply::ok())
}

/// POST /rpc/push-room
async fn push_room(
    State(ctx): State<GatewayContext>,
    Json(req): Json<PushRoomMsgRequest>,
) -> Json<SuccessReply> {
    ctx.server().push_room(req.room_id, req.msg);
    Json(SuccessReply::ok())
}

/// POST /rpc/push-room-count
async fn push_room_count(
    State(ctx): State<GatewayContext>,
    Json(req): Json<PushRoomMsgRequest>,
) -> Json<SuccessReply> {
    ctx.server().push_room_count(req.room_id, req.msg);
    Json(SuccessReply::ok())
}

/// POST /rpc/push-room-info
async fn push_room_info(
    State(ctx): State<GatewayContext>,
    Json(req): Json<PushRoomMsgRequest>,
) -> Json<SuccessReply> {
    ctx.server().push_room_info(req.room_id, req.msg);
    Json(SuccessReply::ok())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    server_id: String,
}

/// GET /health
async fn health_check(State(ctx): State<GatewayContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        server_id: ctx.server().server_id().to_string(),
    })
}

/// GET /stats
async fn stats(State(ctx): State<GatewayContext>) -> Json<ServerStats> {
    Json(ctx.server().stats())
}
