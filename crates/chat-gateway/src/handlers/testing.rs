//! In-memory business tier for unit tests

use async_trait::async_trait;
use chat_common::{BucketConfig, ServerOptions};
use chat_core::{
    ConnectRequest, DisconnectRequest, LogicError, LogicResult, LogicService, SendRoomRequest,
    UserId,
};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::server::Server;

/// Resolves `token-<n>` to user `n`; anything else to user 0
#[derive(Default)]
pub(crate) struct StubLogic {
    fail: bool,
    connects: Mutex<Vec<ConnectRequest>>,
    disconnects: Mutex<Vec<DisconnectRequest>>,
    room_sends: Mutex<Vec<SendRoomRequest>>,
}

impl StubLogic {
    pub(crate) fn accepting() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Self::default()
        })
    }

    pub(crate) fn connects(&self) -> Vec<ConnectRequest> {
        self.connects.lock().clone()
    }

    pub(crate) fn disconnects(&self) -> Vec<DisconnectRequest> {
        self.disconnects.lock().clone()
    }

    pub(crate) fn room_sends(&self) -> Vec<SendRoomRequest> {
        self.room_sends.lock().clone()
    }

    fn check(&self) -> LogicResult<()> {
        if self.fail {
            Err(LogicError::Unavailable("stub offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LogicService for StubLogic {
    async fn connect(&self, req: ConnectRequest) -> LogicResult<UserId> {
        self.check()?;
        let user = req
            .auth_token
            .strip_prefix("token-")
            .and_then(|n| n.parse::<UserId>().ok())
            .unwrap_or_default();
        self.connects.lock().push(req);
        Ok(user)
    }

    async fn disconnect(&self, req: DisconnectRequest) -> LogicResult<()> {
        self.check()?;
        self.disconnects.lock().push(req);
        Ok(())
    }

    async fn push_room(&self, req: SendRoomRequest) -> LogicResult<()> {
        self.check()?;
        self.room_sends.lock().push(req);
        Ok(())
    }
}

pub(crate) fn test_server(logic: Arc<StubLogic>) -> Server {
    Server::builder()
        .server_id("gateway-test")
        .buckets(BucketConfig {
            count: 2,
            channel_size: 16,
            room_size: 16,
            routine_amount: 2,
            routine_size: 8,
        })
        .options(ServerOptions::default())
        .logic(logic)
        .build()
        .expect("test server")
}
