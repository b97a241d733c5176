//! Test helpers for integration tests
//!
//! Provides an in-process gateway, a scripted business tier, and clients for
//! each transport.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chat_common::AppConfig;
use chat_core::{
    ConnectRequest, DisconnectRequest, LogicError, LogicResult, LogicService, RoomId,
    SendRoomRequest, UserId,
};
use chat_gateway::protocol::{FrameCodec, Msg, OpCode, TcpMessage};
use chat_gateway::rpc::PushClient;
use chat_gateway::{serve, GatewayContext, Listeners, Server};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

/// Default wait for anything expected to arrive
pub const RECV_TIMEOUT: Duration = Duration::from_secs(3);

/// In-memory business tier.
///
/// Resolves `token-<n>` to user `n` and any other token to user 0. Room
/// sends are echoed back through the gateway's push surface once
/// [`MockLogic::echo_to`] is set, which closes the TCP room-chat loop.
#[derive(Default)]
pub struct MockLogic {
    connects: Mutex<Vec<ConnectRequest>>,
    disconnects: Mutex<Vec<DisconnectRequest>>,
    room_sends: Mutex<Vec<SendRoomRequest>>,
    echo: OnceLock<PushClient>,
}

impl MockLogic {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn echo_to(&self, client: PushClient) {
        let _ = self.echo.set(client);
    }

    pub fn connects(&self) -> Vec<ConnectRequest> {
        self.connects.lock().clone()
    }

    pub fn disconnects(&self) -> Vec<DisconnectRequest> {
        self.disconnects.lock().clone()
    }

    pub fn room_sends(&self) -> Vec<SendRoomRequest> {
        self.room_sends.lock().clone()
    }
}

#[async_trait]
impl LogicService for MockLogic {
    async fn connect(&self, req: ConnectRequest) -> LogicResult<UserId> {
        let user = req
            .auth_token
            .strip_prefix("token-")
            .and_then(|n| n.parse::<UserId>().ok())
            .unwrap_or_default();
        self.connects.lock().push(req);
        Ok(user)
    }

    async fn disconnect(&self, req: DisconnectRequest) -> LogicResult<()> {
        self.disconnects.lock().push(req);
        Ok(())
    }

    async fn push_room(&self, req: SendRoomRequest) -> LogicResult<()> {
        self.room_sends.lock().push(req.clone());

        if let Some(client) = self.echo.get() {
            let body = serde_json::json!({
                "fromUserId": req.from_user_id,
                "fromUserName": req.from_user_name,
                "msg": req.msg,
            })
            .to_string();
            client
                .push_room(req.room_id, Msg::new(OpCode::RoomSend, Default::default(), body))
                .await
                .map_err(|e| LogicError::Unavailable(e.to_string()))?;
        }
        Ok(())
    }
}

/// Gateway running in-process on ephemeral ports
pub struct TestGateway {
    pub ws_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub tcp_addr: SocketAddr,
    pub server: Arc<Server>,
    pub logic: Arc<MockLogic>,
    pub push: PushClient,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestGateway {
    /// Start with two buckets and raw TCP enabled
    pub async fn start() -> Result<Self> {
        Self::start_with(&[]).await
    }

    /// Start with extra configuration variables layered over the defaults
    pub async fn start_with(overrides: &[(&str, &str)]) -> Result<Self> {
        let config = test_config(overrides)?;
        let logic = MockLogic::new();

        let server = Server::builder()
            .server_id(config.gateway.server_id.clone())
            .buckets(config.bucket)
            .options(config.server)
            .logic(Arc::clone(&logic) as Arc<dyn LogicService>)
            .build()?;

        let listeners = Listeners::bind(&config.gateway).await?;
        let ws_addr = listeners.ws_addr()?;
        let rpc_addr = listeners.rpc_addr()?;
        let tcp_addr = *listeners
            .tcp_addrs()?
            .first()
            .context("TCP listener not bound")?;

        let ctx = GatewayContext::new(server, config);
        let server = Arc::clone(ctx.server());
        let shutdown = CancellationToken::new();

        let serve_token = shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = serve(ctx, listeners, serve_token).await {
                eprintln!("test gateway stopped: {e}");
            }
        });

        let push = PushClient::new(format!("http://{rpc_addr}"), Duration::from_secs(5))?;
        logic.echo_to(push.clone());

        Ok(Self {
            ws_addr,
            rpc_addr,
            tcp_addr,
            server,
            logic,
            push,
            shutdown,
            handle,
        })
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.ws_addr)
    }

    pub fn rpc_url(&self, path: &str) -> String {
        format!("http://{}{path}", self.rpc_addr)
    }

    /// Open a WebSocket and send the join frame
    pub async fn ws_client(&self, join: String) -> Result<WsClient> {
        let (mut stream, _) = connect_async(self.ws_url()).await?;
        stream.send(Message::Text(join)).await?;
        Ok(WsClient { stream })
    }

    /// Open a raw-TCP connection
    pub async fn tcp_client(&self) -> Result<TcpClient> {
        let stream = TcpStream::connect(self.tcp_addr).await?;
        Ok(TcpClient {
            framed: Framed::new(stream, FrameCodec::new(4096)),
        })
    }

    /// Wait until `user` is registered in its bucket
    pub async fn wait_joined(&self, user: UserId) -> Result<()> {
        self.wait_until(|| self.server.bucket(user).lookup_by_user(user).is_some())
            .await
            .with_context(|| format!("user {user} never joined"))
    }

    /// Wait until `user` is gone from its bucket
    pub async fn wait_left(&self, user: UserId) -> Result<()> {
        self.wait_until(|| self.server.bucket(user).lookup_by_user(user).is_none())
            .await
            .with_context(|| format!("user {user} never left"))
    }

    /// Wait until the room has `count` members across all buckets
    pub async fn wait_room_size(&self, room: RoomId, count: usize) -> Result<()> {
        self.wait_until(|| self.room_size(room) == count)
            .await
            .with_context(|| format!("room {room} never reached {count} members"))
    }

    pub fn room_size(&self, room: RoomId) -> usize {
        self.server
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.lookup_room(room))
            .map(|room| room.online_count())
            .sum()
    }

    pub async fn wait_until(&self, check: impl FnMut() -> bool) -> Result<()> {
        self.wait_until_for(RECV_TIMEOUT, check).await
    }

    /// Like [`TestGateway::wait_until`], for conditions that take longer
    /// than [`RECV_TIMEOUT`] (e.g. heartbeat deadlines)
    pub async fn wait_until_for(
        &self,
        limit: Duration,
        mut check: impl FnMut() -> bool,
    ) -> Result<()> {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if check() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!("condition not met within {limit:?}")
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.handle.abort();
    }
}

/// Configuration bound to ephemeral ports on localhost
pub fn test_config(overrides: &[(&str, &str)]) -> Result<AppConfig> {
    let mut vars: HashMap<&str, &str> = [
        ("GATEWAY_HOST", "127.0.0.1"),
        ("GATEWAY_WS_PORT", "0"),
        ("GATEWAY_RPC_PORT", "0"),
        ("GATEWAY_TCP_PORTS", "0"),
        ("GATEWAY_TCP_ACCEPTORS", "2"),
        ("GATEWAY_SERVER_ID", "gateway-it"),
        ("BUCKET_COUNT", "2"),
        ("BUCKET_ROUTINE_AMOUNT", "4"),
        ("LOGIC_URL", "http://127.0.0.1:1"),
    ]
    .into_iter()
    .collect();
    vars.extend(overrides.iter().copied());

    AppConfig::from_lookup(|key| vars.get(key).map(ToString::to_string))
        .map_err(|e| anyhow::anyhow!("Config error: {e}"))
}

/// WebSocket client side
pub struct WsClient {
    pub stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    /// Next text message, skipping control frames
    pub async fn recv_text(&mut self) -> Result<String> {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a message")?
                .context("stream ended")??;
            match next {
                Message::Text(text) => return Ok(text),
                Message::Close(_) => anyhow::bail!("connection closed"),
                _ => continue,
            }
        }
    }

    /// Whether the server closes the connection within the timeout
    pub async fn expect_closed(&mut self) -> bool {
        let wait = async {
            loop {
                match self.stream.next().await {
                    None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        };
        tokio::time::timeout(RECV_TIMEOUT, wait).await.unwrap_or(false)
    }

    /// Next ping from the server, skipping anything else
    pub async fn recv_ping(&mut self) -> Result<Vec<u8>> {
        loop {
            let next = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for a ping")?
                .context("stream ended")??;
            match next {
                Message::Ping(payload) => return Ok(payload),
                Message::Close(_) => anyhow::bail!("connection closed"),
                _ => continue,
            }
        }
    }

    pub async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Raw-TCP client side
pub struct TcpClient {
    pub framed: Framed<TcpStream, FrameCodec>,
}

impl TcpClient {
    pub async fn send(&mut self, message: &TcpMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.framed.send(Bytes::from(payload)).await?;
        Ok(())
    }

    /// Next frame payload as text
    pub async fn recv_text(&mut self) -> Result<String> {
        let frame = tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .context("timed out waiting for a frame")?
            .context("connection closed")??;
        Ok(String::from_utf8(frame.to_vec())?)
    }

    /// Whether the server closes the connection within the timeout
    pub async fn expect_closed(&mut self) -> bool {
        let wait = async {
            loop {
                match self.framed.next().await {
                    None | Some(Err(_)) => return true,
                    Some(Ok(_)) => continue,
                }
            }
        };
        tokio::time::timeout(RECV_TIMEOUT, wait).await.unwrap_or(false)
    }
}
