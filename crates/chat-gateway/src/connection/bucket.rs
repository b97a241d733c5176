//! Bucket - one shard of the connection space
//!
//! A bucket owns the user-id index and the room index for its partition of
//! users, plus its broadcast workers. Lock order is always
//! bucket index, then room, then channel link.

use chat_core::{RoomId, UserId};
use chat_common::BucketConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use super::channel::{Channel, Delivery};
use super::room::{Room, RoomError};
use crate::broadcast::{spawn_workers, BroadcastJob};
use crate::protocol::Msg;

/// Bucket errors
#[derive(Debug, thiserror::Error)]
pub enum BucketError {
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error("Connection {0} has already joined")]
    AlreadyJoined(u64),

    #[error("Connection {0} is closing")]
    Closing(u64),
}

/// User and room indices shared with the broadcast workers
#[derive(Debug, Default)]
pub(crate) struct BucketIndex {
    channels: HashMap<UserId, Arc<Channel>>,
    rooms: HashMap<RoomId, Arc<Room>>,
}

impl BucketIndex {
    fn with_capacity(channels: usize, rooms: usize) -> Self {
        Self {
            channels: HashMap::with_capacity(channels),
            rooms: HashMap::with_capacity(rooms),
        }
    }

    pub(crate) fn room(&self, room_id: RoomId) -> Option<Arc<Room>> {
        self.rooms.get(&room_id).cloned()
    }
}

/// Where a removed channel had been registered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Departure {
    pub user_id: UserId,
    pub room_id: RoomId,
    /// The channel's room emptied and was removed from the index
    pub room_closed: bool,
}

/// One shard of channels and rooms
pub struct Bucket {
    id: usize,
    index: Arc<RwLock<BucketIndex>>,
    workers: Vec<mpsc::Sender<BroadcastJob>>,
    next_worker: AtomicU64,
}

impl Bucket {
    /// Create a bucket and start its broadcast workers.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(id: usize, config: &BucketConfig) -> Arc<Self> {
        let index = Arc::new(RwLock::new(BucketIndex::with_capacity(
            config.channel_size,
            config.room_size,
        )));
        let workers = spawn_workers(id, &index, config.routine_amount, config.routine_size);

        Arc::new(Self {
            id,
            index,
            workers,
            next_worker: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Register `channel` under `user_id` and, unless `room_id` is
    /// `RoomId::NONE`, link it into that room (created on first use).
    ///
    /// Both registrations happen under one exclusive section. A newer channel
    /// for the same user replaces the old one in the user index; the old
    /// channel stays in its room until its own teardown. A channel whose
    /// teardown has started is refused.
    pub fn put(
        &self,
        user_id: UserId,
        room_id: RoomId,
        channel: &Arc<Channel>,
    ) -> Result<(), BucketError> {
        let mut index = self.index.write();

        if channel.is_joined() {
            return Err(BucketError::AlreadyJoined(channel.conn_id()));
        }
        if channel.is_closing() {
            return Err(BucketError::Closing(channel.conn_id()));
        }

        if room_id.is_room() {
            let room = Arc::clone(
                index
                    .rooms
                    .entry(room_id)
                    .or_insert_with(|| Room::new(room_id)),
            );
            match room.put(channel) {
                Ok(()) => {}
                Err(RoomError::Dropped(_)) => {
                    // A retired room left in the index; replace it
                    let fresh = Room::new(room_id);
                    fresh.put(channel)?;
                    index.rooms.insert(room_id, fresh);
                }
            }
        }

        if let Some(previous) = index.channels.insert(user_id, Arc::clone(channel)) {
            tracing::debug!(
                bucket = self.id,
                user_id = %user_id,
                old_conn_id = previous.conn_id(),
                new_conn_id = channel.conn_id(),
                "User reconnected, replacing channel"
            );
        }
        channel.set_joined(user_id, room_id);
        Ok(())
    }

    /// Undo [`Bucket::put`]. Returns `None` if the channel never joined.
    pub fn remove(&self, channel: &Arc<Channel>) -> Option<Departure> {
        if !channel.is_joined() {
            return None;
        }
        let user_id = channel.user_id();
        let mut index = self.index.write();

        if index
            .channels
            .get(&user_id)
            .is_some_and(|current| Arc::ptr_eq(current, channel))
        {
            index.channels.remove(&user_id);
        }

        let mut room_closed = false;
        if let Some(room) = channel.room() {
            if room.remove(channel) {
                room_closed = true;
                if index
                    .rooms
                    .get(&room.id())
                    .is_some_and(|current| Arc::ptr_eq(current, &room))
                {
                    index.rooms.remove(&room.id());
                }
            }
        }

        Some(Departure {
            user_id,
            room_id: channel.room_id(),
            room_closed,
        })
    }

    /// Channel currently registered for `user_id`
    pub fn lookup_by_user(&self, user_id: UserId) -> Option<Arc<Channel>> {
        self.index.read().channels.get(&user_id).cloned()
    }

    pub fn lookup_room(&self, room_id: RoomId) -> Option<Arc<Room>> {
        self.index.read().room(room_id)
    }

    /// Queue a room broadcast on the next worker (round-robin).
    ///
    /// Never waits: a backed-up worker drops the broadcast.
    pub fn broadcast_to_room(&self, room_id: RoomId, msg: Arc<Msg>) -> Delivery {
        let n = self.next_worker.fetch_add(1, Ordering::Relaxed);
        let worker = (n % self.workers.len() as u64) as usize;

        match self.workers[worker].try_send(BroadcastJob { room_id, msg }) {
            Ok(()) => Delivery::Accepted,
            Err(TrySendError::Full(_)) => {
                tracing::debug!(
                    bucket = self.id,
                    worker,
                    room_id = %room_id,
                    "Broadcast queue full, message dropped"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(bucket = self.id, worker, "Broadcast worker gone, message dropped");
                Delivery::Dropped
            }
        }
    }

    pub fn channel_count(&self) -> usize {
        self.index.read().channels.len()
    }

    pub fn room_count(&self) -> usize {
        self.index.read().rooms.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("id", &self.id)
            .field("channels", &self.channel_count())
            .field("rooms", &self.room_count())
            .field("workers", &self.workers.len())
            .finish()
    }
}
