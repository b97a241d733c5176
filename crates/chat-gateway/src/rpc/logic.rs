//! HTTP client for the business tier
//!
//! `POST {base}/connect` answers `{"userId": n}`; `/disconnect` and
//! `/push-room` answer `{"code": 0, "msg": "success"}`.

use async_trait::async_trait;
use chat_common::LogicConfig;
use chat_core::{
    ConnectRequest, DisconnectRequest, LogicError, LogicResult, LogicService, SendRoomRequest,
    UserId,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::protocol::SUCCESS_REPLY_CODE;
use crate::server::{ServerError, ServerResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectReply {
    #[serde(default)]
    user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct AckReply {
    code: i32,
    #[serde(default)]
    msg: String,
}

/// [`LogicService`] over HTTP/JSON
#[derive(Debug, Clone)]
pub struct HttpLogicClient {
    client: Client,
    base_url: String,
}

impl HttpLogicClient {
    pub fn new(config: &LogicConfig) -> ServerResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ServerError::LogicClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    async fn call<B, R>(&self, path: &str, body: &B) -> LogicResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LogicError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<R>()
            .await
            .map_err(|e| LogicError::InvalidResponse(e.to_string()))
    }

    async fn call_ack<B>(&self, path: &str, body: &B) -> LogicResult<()>
    where
        B: Serialize + Sync,
    {
        let reply: AckReply = self.call(path, body).await?;
        if reply.code == SUCCESS_REPLY_CODE {
            Ok(())
        } else {
            Err(LogicError::Refused {
                code: reply.code,
                msg: reply.msg,
            })
        }
    }
}

fn map_transport_error(err: reqwest::Error) -> LogicError {
    if err.is_timeout() {
        LogicError::Timeout
    } else {
        LogicError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl LogicService for HttpLogicClient {
    async fn connect(&self, req: ConnectRequest) -> LogicResult<UserId> {
        let reply: ConnectReply = self.call("/connect", &req).await?;
        Ok(reply.user_id)
    }

    async fn disconnect(&self, req: DisconnectRequest) -> LogicResult<()> {
        self.call_ack("/disconnect", &req).await
    }

    async fn push_room(&self, req: SendRoomRequest) -> LogicResult<()> {
        self.call_ack("/push-room", &req).await
    }
}
