//! WebSocket transport
//!
//! One read pump and one write pump per connection. The first text frame
//! must be a join request; everything the client sends afterwards is ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chat_common::ServerOptions;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::sync::Arc;
use tokio::time::{interval_at, timeout, Instant};
use tower_http::trace::TraceLayer;

use super::{GatewayContext, Server};
use crate::connection::{Channel, Mailbox};
use crate::handlers::{HandlerResult, JoinHandler};
use crate::protocol::{JoinRequest, PING_PAYLOAD};

/// Router serving the upgrade endpoint at `path`
pub fn create_ws_router(path: &str, ctx: GatewayContext) -> Router {
    Router::new()
        .route(path, get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    State(ctx): State<GatewayContext>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let options = *ctx.server().options();
    ws.max_message_size(options.max_message_size)
        .write_buffer_size(options.write_buffer_size)
        .on_upgrade(move |socket| handle_socket(ctx, socket))
}

/// Why a read pump stopped
#[derive(Debug)]
enum ReadEnd {
    PeerClosed,
    /// Nothing arrived within the pong wait
    Deadline,
    Transport(axum::Error),
}

async fn handle_socket(ctx: GatewayContext, socket: WebSocket) {
    let server = Arc::clone(ctx.server());
    let options = *server.options();
    let (channel, mailbox) = server.new_channel();
    let conn_id = channel.conn_id();

    tracing::debug!(conn_id, "WebSocket connection accepted");

    let (ws_sink, ws_stream) = socket.split();

    let mut recv_task = tokio::spawn(read_pump(
        Arc::clone(&server),
        Arc::clone(&channel),
        ws_stream,
        options,
    ));
    let mut send_task = tokio::spawn(write_pump(conn_id, ws_sink, mailbox, options));

    // The surviving pump is stopped before teardown so a late join cannot
    // register a channel that is already gone
    tokio::select! {
        result = &mut recv_task => {
            match result {
                Ok(Ok(end)) => tracing::debug!(conn_id, reason = ?end, "Read pump ended"),
                Ok(Err(e)) => tracing::info!(conn_id, error = %e, kind = e.kind(), "Join failed"),
                Err(e) => tracing::warn!(conn_id, error = %e, "Read pump panicked"),
            }
            send_task.abort();
            let _ = (&mut send_task).await;
        }
        _ = &mut send_task => {
            tracing::debug!(conn_id, "Write pump ended");
            recv_task.abort();
            let _ = (&mut recv_task).await;
        }
    }

    server.disconnect(&channel).await;
}

async fn read_pump(
    server: Arc<Server>,
    channel: Arc<Channel>,
    mut stream: SplitStream<WebSocket>,
    options: ServerOptions,
) -> HandlerResult<ReadEnd> {
    let request = loop {
        match next_frame(&mut stream, &options).await {
            Ok(Message::Text(text)) => break serde_json::from_str::<JoinRequest>(&text)?,
            Ok(Message::Binary(bytes)) => break serde_json::from_slice::<JoinRequest>(&bytes)?,
            Ok(Message::Close(_)) => return Ok(ReadEnd::PeerClosed),
            Ok(_) => continue,
            Err(end) => return Ok(end),
        }
    };

    JoinHandler::handle(&server, &channel, &request.auth_token, request.room_id).await?;

    loop {
        match next_frame(&mut stream, &options).await {
            Ok(Message::Close(_)) => return Ok(ReadEnd::PeerClosed),
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = channel.conn_id(), "Pong received");
            }
            Ok(_) => {
                tracing::trace!(conn_id = channel.conn_id(), "Ignoring frame after join");
            }
            Err(end) => return Ok(end),
        }
    }
}

/// Read one frame, treating silence past the pong wait as a dead peer
async fn next_frame(
    stream: &mut SplitStream<WebSocket>,
    options: &ServerOptions,
) -> Result<Message, ReadEnd> {
    match timeout(options.pong_wait, stream.next()).await {
        Ok(Some(Ok(msg))) => Ok(msg),
        Ok(Some(Err(e))) => Err(ReadEnd::Transport(e)),
        Ok(None) => Err(ReadEnd::PeerClosed),
        Err(_) => Err(ReadEnd::Deadline),
    }
}

async fn write_pump(
    conn_id: u64,
    mut sink: SplitSink<WebSocket, Message>,
    mut mailbox: Mailbox,
    options: ServerOptions,
) {
    let mut ping = interval_at(Instant::now() + options.ping_period, options.ping_period);

    loop {
        let outgoing = tokio::select! {
            msg = mailbox.recv() => match msg {
                Some(msg) => Message::Text(msg.body.clone()),
                None => break,
            },
            _ = ping.tick() => Message::Ping(PING_PAYLOAD.to_vec()),
        };

        match timeout(options.write_wait, sink.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(conn_id, error = %e, "WebSocket write failed");
                return;
            }
            Err(_) => {
                tracing::debug!(conn_id, "WebSocket write deadline exceeded");
                return;
            }
        }
    }

    let _ = sink.close().await;
}
