//! Push client for delivery-tier callers
//!
//! Wraps the four push calls of one gateway instance.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{Msg, PushMsgRequest, PushRoomMsgRequest, SuccessReply};
use chat_core::{RoomId, UserId};

/// Push call failures
#[derive(Debug, Error)]
pub enum PushClientError {
    #[error("Push request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Gateway returned status {0}")]
    Status(u16),

    #[error("Gateway replied with code {code}: {msg}")]
    Reply { code: i32, msg: String },
}

/// HTTP client for one gateway's push surface
#[derive(Debug, Clone)]
pub struct PushClient {
    client: Client,
    base_url: String,
}

impl PushClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PushClientError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Share an existing connection pool
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn push_single(&self, user_id: UserId, msg: Msg) -> Result<(), PushClientError> {
        self.call("/rpc/push-single", &PushMsgRequest { user_id, msg }).await
    }

    pub async fn push_room(&self, room_id: RoomId, msg: Msg) -> Result<(), PushClientError> {
        self.call("/rpc/push-room", &PushRoomMsgRequest { room_id, msg }).await
    }

    pub async fn push_room_count(&self, room_id: RoomId, msg: Msg) -> Result<(), PushClientError> {
        self.call("/rpc/push-room-count", &PushRoomMsgRequest { room_id, msg })
            .await
    }

    pub async fn push_room_info(&self, room_id: RoomId, msg: Msg) -> Result<(), PushClientError> {
        self.call("/rpc/push-room-info", &PushRoomMsgRequest { room_id, msg })
            .await
    }

    async fn call<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), PushClientError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushClientError::Status(status.as_u16()));
        }

        let reply: SuccessReply = response.json().await?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(PushClientError::Reply {
                code: reply.code,
                msg: reply.msg,
            })
        }
    }
}
