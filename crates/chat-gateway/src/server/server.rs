//! The gateway server
//!
//! Owns the buckets and the business-tier client, and implements the
//! operations shared by every transport and by the push RPC surface.

use chat_common::{BucketConfig, ServerOptions};
use chat_core::{DisconnectRequest, LogicService, RoomId, SnowflakeGenerator, UserId};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::error::{ServerError, ServerResult};
use crate::connection::{Bucket, Channel, Delivery, Mailbox};
use crate::protocol::{Msg, OpCode};

/// Channel and room totals across all buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    pub buckets: usize,
    pub channels: usize,
    pub rooms: usize,
}

/// Process-wide gateway state
pub struct Server {
    server_id: String,
    buckets: Vec<Arc<Bucket>>,
    options: ServerOptions,
    logic: Arc<dyn LogicService>,
    sequence: Arc<SnowflakeGenerator>,
    next_conn_id: AtomicU64,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Instance identifier sent to the business tier on join
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    pub fn logic(&self) -> &Arc<dyn LogicService> {
        &self.logic
    }

    pub fn buckets(&self) -> &[Arc<Bucket>] {
        &self.buckets
    }

    /// Bucket owning `user_id`
    pub fn bucket(&self, user_id: UserId) -> &Arc<Bucket> {
        &self.buckets[bucket_index(user_id, self.buckets.len())]
    }

    /// Create an unjoined channel for a freshly accepted connection
    pub fn new_channel(&self) -> (Arc<Channel>, Mailbox) {
        let conn_id = self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1;
        Channel::new(conn_id, self.options.broadcast_size)
    }

    /// Deliver `msg` to the channel registered for `user_id`.
    ///
    /// Returns `None` when the user has no channel on this instance.
    pub fn push_single(&self, user_id: UserId, msg: Msg) -> Option<Delivery> {
        let channel = self.bucket(user_id).lookup_by_user(user_id)?;
        let delivery = channel.push(Arc::new(self.stamp(msg)));
        tracing::trace!(user_id = %user_id, conn_id = channel.conn_id(), ?delivery, "Single push");
        Some(delivery)
    }

    /// Queue `msg` for every member of `room_id`, on every bucket.
    ///
    /// Does not wait on backed-up broadcast workers; those buckets drop it.
    pub fn push_room(&self, room_id: RoomId, msg: Msg) {
        let msg = Arc::new(self.stamp(msg));
        for bucket in &self.buckets {
            bucket.broadcast_to_room(room_id, Arc::clone(&msg));
        }
    }

    /// Fan out a room online-count update
    pub fn push_room_count(&self, room_id: RoomId, mut msg: Msg) {
        msg.op = OpCode::RoomCountSend;
        self.push_room(room_id, msg);
    }

    /// Fan out a room membership-info update
    pub fn push_room_info(&self, room_id: RoomId, mut msg: Msg) {
        msg.op = OpCode::RoomInfoSend;
        self.push_room(room_id, msg);
    }

    /// Tear down `channel`. Only the first call per channel does any work.
    ///
    /// A joined channel leaves its bucket. The business tier is told the user
    /// left only when the channel was in a room; a failed leave call is logged
    /// and not retried.
    pub async fn disconnect(&self, channel: &Arc<Channel>) {
        if !channel.begin_close() {
            return;
        }
        if !channel.is_joined() {
            tracing::debug!(conn_id = channel.conn_id(), "Unjoined connection closed");
            return;
        }

        let user_id = channel.user_id();
        let Some(departure) = self.bucket(user_id).remove(channel) else {
            return;
        };
        tracing::info!(
            conn_id = channel.conn_id(),
            user_id = %departure.user_id,
            room_id = %departure.room_id,
            room_closed = departure.room_closed,
            "Connection left"
        );
        if !departure.room_id.is_room() {
            return;
        }

        let request = DisconnectRequest {
            user_id: departure.user_id,
            room_id: departure.room_id,
        };
        if let Err(e) = self.logic.disconnect(request).await {
            tracing::warn!(
                user_id = %departure.user_id,
                room_id = %departure.room_id,
                error = %e,
                "Leave call failed"
            );
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            buckets: self.buckets.len(),
            channels: self.buckets.iter().map(|b| b.channel_count()).sum(),
            rooms: self.buckets.iter().map(|b| b.room_count()).sum(),
        }
    }

    fn stamp(&self, mut msg: Msg) -> Msg {
        if msg.seq.is_zero() {
            msg.seq = self.sequence.generate();
        }
        msg
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("server_id", &self.server_id)
            .field("buckets", &self.buckets.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Pick the bucket for `user_id`: FNV-1a over its decimal form.
fn bucket_index(user_id: UserId, bucket_count: usize) -> usize {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    let hash = user_id
        .to_string()
        .bytes()
        .fold(OFFSET_BASIS, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(PRIME));
    hash as usize % bucket_count.max(1)
}

/// Builder for [`Server`]
pub struct ServerBuilder {
    server_id: Option<String>,
    buckets: BucketConfig,
    options: ServerOptions,
    logic: Option<Arc<dyn LogicService>>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            server_id: None,
            buckets: BucketConfig::default(),
            options: ServerOptions::default(),
            logic: None,
            snowflake_generator: None,
        }
    }

    pub fn server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn buckets(mut self, config: BucketConfig) -> Self {
        self.buckets = config;
        self
    }

    pub fn options(mut self, options: ServerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn logic(mut self, logic: Arc<dyn LogicService>) -> Self {
        self.logic = Some(logic);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    /// Build the server and start every bucket's broadcast workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build(self) -> ServerResult<Server> {
        let server_id = self
            .server_id
            .ok_or(ServerError::MissingDependency("server_id"))?;
        let logic = self.logic.ok_or(ServerError::MissingDependency("logic"))?;

        let count = self.buckets.count.max(1);
        let buckets = (0..count)
            .map(|id| Bucket::new(id, &self.buckets))
            .collect::<Vec<_>>();

        tracing::info!(
            server_id = %server_id,
            buckets = count,
            workers_per_bucket = self.buckets.routine_amount,
            "Server initialized"
        );

        Ok(Server {
            server_id,
            buckets,
            options: self.options,
            logic,
            sequence: self.snowflake_generator.unwrap_or_default(),
            next_conn_id: AtomicU64::new(0),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
