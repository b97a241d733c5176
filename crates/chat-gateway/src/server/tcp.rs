//! Raw-TCP transport
//!
//! Frames follow the `v1` wire format. A client joins with `BuildTcpConn`
//! and may then publish room chat on the same socket with `RoomSend`. Every
//! frame must carry an auth token and a positive room id.

use bytes::Bytes;
use chat_common::{ServerOptions, TcpConfig};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use super::error::{ServerError, ServerResult};
use super::Server;
use crate::connection::{Channel, Mailbox};
use crate::handlers::{HandlerError, HandlerResult, JoinHandler, RoomSendHandler};
use crate::protocol::{max_encodable_frame, FrameCodec, FrameError, OpCode, TcpMessage, PING_PAYLOAD};

const LISTEN_BACKLOG: u32 = 1024;

/// Bind a raw-TCP listener with the configured socket options.
///
/// Buffer sizes and keepalive are set on the listening socket and inherited
/// by accepted connections.
pub async fn bind_tcp(addr: &str, config: &TcpConfig) -> ServerResult<TcpListener> {
    let resolved = tokio::net::lookup_host(addr)
        .await
        .map_err(|e| ServerError::bind(addr, e))?
        .next()
        .ok_or_else(|| {
            ServerError::bind(
                addr,
                std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no address resolved"),
            )
        })?;

    let socket = if resolved.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .map_err(|e| ServerError::bind(addr, e))?;

    let configure = |socket: &TcpSocket| -> std::io::Result<()> {
        socket.set_reuseaddr(true)?;
        socket.set_keepalive(config.keepalive)?;
        socket.set_recv_buffer_size(u32::try_from(config.recv_buffer).unwrap_or(u32::MAX))?;
        socket.set_send_buffer_size(u32::try_from(config.send_buffer).unwrap_or(u32::MAX))?;
        socket.bind(resolved)
    };
    configure(&socket).map_err(|e| ServerError::bind(addr, e))?;

    socket
        .listen(LISTEN_BACKLOG)
        .map_err(|e| ServerError::bind(addr, e))
}

/// Run `acceptors` accept loops on `listener` until `shutdown` fires
pub async fn serve_tcp(
    server: Arc<Server>,
    listener: TcpListener,
    acceptors: usize,
    shutdown: CancellationToken,
) {
    let listener = Arc::new(listener);
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, acceptors, "TCP listener started");
    }

    let tasks: Vec<_> = (0..acceptors.max(1))
        .map(|acceptor| {
            tokio::spawn(accept_loop(
                Arc::clone(&server),
                Arc::clone(&listener),
                acceptor,
                shutdown.clone(),
            ))
        })
        .collect();

    for task in tasks {
        let _ = task.await;
    }
}

async fn accept_loop(
    server: Arc<Server>,
    listener: Arc<TcpListener>,
    acceptor: usize,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer)) => {
                tokio::spawn(handle_conn(Arc::clone(&server), stream, peer));
            }
            Err(e) => {
                // Per-connection accept failures (e.g. aborted handshakes) are not fatal
                tracing::warn!(acceptor, error = %e, "TCP accept failed");
            }
        }
    }
    tracing::debug!(acceptor, "TCP acceptor stopped");
}

async fn handle_conn(server: Arc<Server>, stream: TcpStream, peer: SocketAddr) {
    let options = *server.options();
    let (channel, mailbox) = server.new_channel();
    let conn_id = channel.conn_id();

    tracing::debug!(conn_id, %peer, "TCP connection accepted");

    let (reader, writer) = stream.into_split();
    let frames = FramedRead::new(reader, FrameCodec::new(options.max_message_size));
    let sink = FramedWrite::new(writer, FrameCodec::new(max_encodable_frame()));

    let mut recv_task = tokio::spawn(read_pump(Arc::clone(&server), Arc::clone(&channel), frames));
    let mut send_task = tokio::spawn(write_pump(conn_id, sink, mailbox, options));

    // The surviving pump is stopped before teardown so a late join cannot
    // register a channel that is already gone
    tokio::select! {
        result = &mut recv_task => {
            match result {
                Ok(Ok(())) => tracing::debug!(conn_id, "TCP peer closed"),
                Ok(Err(e)) => tracing::info!(conn_id, error = %e, kind = e.kind(), "TCP connection rejected"),
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

/// Read frames until the peer goes away or sends something fatal
async fn read_pump(
    server: Arc<Server>,
    channel: Arc<Channel>,
    mut frames: FramedRead<OwnedReadHalf, FrameCodec>,
) -> HandlerResult<()> {
    while let Some(frame) = frames.next().await {
        let message = decode_frame(&frame?)?;

        match OpCode::from_i32(message.op) {
            Some(OpCode::BuildTcpConn) if channel.is_joined() => {
                tracing::trace!(conn_id = channel.conn_id(), "Ignoring repeated join");
            }
            Some(OpCode::BuildTcpConn) => {
                JoinHandler::handle(&server, &channel, &message.auth_token, message.room_id)
                    .await?;
            }
            Some(OpCode::RoomSend) => {
                match RoomSendHandler::handle(&server, &channel, message).await {
                    Ok(()) => {}
                    Err(HandlerError::NotJoined) => {
                        tracing::debug!(conn_id = channel.conn_id(), "Room send before join ignored");
                    }
                    Err(e) => {
                        tracing::warn!(conn_id = channel.conn_id(), error = %e, "Room send failed");
                    }
                }
            }
            _ => {
                tracing::trace!(conn_id = channel.conn_id(), op = message.op, "Ignoring TCP op");
            }
        }
    }
    Ok(())
}

/// Parse and validate one frame payload
fn decode_frame(payload: &[u8]) -> HandlerResult<TcpMessage> {
    let message: TcpMessage = serde_json::from_slice(payload)?;
    if message.auth_token.is_empty() {
        return Err(HandlerError::MissingAuthToken);
    }
    if !message.room_id.is_positive() {
        return Err(HandlerError::InvalidRoomId(message.room_id));
    }
    Ok(message)
}

async fn write_pump(
    conn_id: u64,
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    mut mailbox: Mailbox,
    options: ServerOptions,
) {
    let mut ping = interval_at(Instant::now() + options.ping_period, options.ping_period);

    loop {
        let outgoing = tokio::select! {
            msg = mailbox.recv() => match msg {
                Some(msg) => Bytes::from(msg.body.clone()),
                None => break,
            },
            _ = ping.tick() => Bytes::from_static(PING_PAYLOAD),
        };

        match timeout(options.write_wait, sink.send(outgoing)).await {
            Ok(Ok(())) => {}
            Ok(Err(FrameError::FrameTooLarge { len, max })) => {
                tracing::warn!(conn_id, len, max, "Message too large for a frame, dropped");
            }
            Ok(Err(e)) => {
                tracing::debug!(conn_id, error = %e, "TCP write failed");
                return;
            }
            Err(_) => {
                tracing::debug!(conn_id, "TCP write deadline exceeded");
                return;
            }
        }
    }

    let _ = sink.close().await;
}
