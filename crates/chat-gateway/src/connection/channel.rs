//! One client's live session
//!
//! A channel owns the sending half of its bounded mailbox; the transport's
//! write pump owns the receiving half. Room linkage is recorded here but is
//! only ever changed by the owning [`Room`](super::Room) under its lock.

use chat_core::{RoomId, UserId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use super::room::Room;
use crate::protocol::Msg;

/// Receiving half of a channel's mailbox, drained by the write pump
pub type Mailbox = mpsc::Receiver<Arc<Msg>>;

/// Outcome of a mailbox push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Accepted,
    /// Mailbox full or transport gone; the message is lost
    Dropped,
}

/// Position of a channel inside its room
#[derive(Debug, Clone)]
pub(crate) struct RoomLink {
    pub(crate) room: Weak<Room>,
    pub(crate) slot: usize,
}

/// Gateway-side state for one client connection
pub struct Channel {
    conn_id: u64,
    user_id: AtomicI64,
    room_id: AtomicI64,
    mailbox: mpsc::Sender<Arc<Msg>>,
    link: Mutex<Option<RoomLink>>,
    closing: AtomicBool,
}

impl Channel {
    /// Create a channel whose mailbox holds at most `mailbox_size` messages
    pub fn new(conn_id: u64, mailbox_size: usize) -> (Arc<Self>, Mailbox) {
        let (tx, rx) = mpsc::channel(mailbox_size.max(1));
        let channel = Arc::new(Self {
            conn_id,
            user_id: AtomicI64::new(0),
            room_id: AtomicI64::new(RoomId::NONE.into_inner()),
            mailbox: tx,
            link: Mutex::new(None),
            closing: AtomicBool::new(false),
        });
        (channel, rx)
    }

    /// Process-unique connection id
    pub fn conn_id(&self) -> u64 {
        self.conn_id
    }

    /// Joined user, or `UserId(0)` before a successful join
    pub fn user_id(&self) -> UserId {
        UserId::new(self.user_id.load(Ordering::Acquire))
    }

    /// Room requested at join time (`RoomId::NONE` if none)
    pub fn room_id(&self) -> RoomId {
        RoomId::new(self.room_id.load(Ordering::Acquire))
    }

    pub fn is_joined(&self) -> bool {
        !self.user_id().is_zero()
    }

    pub(crate) fn set_joined(&self, user_id: UserId, room_id: RoomId) {
        self.room_id.store(room_id.into_inner(), Ordering::Release);
        self.user_id.store(user_id.into_inner(), Ordering::Release);
    }

    /// Enqueue without waiting; a full mailbox drops the message
    pub fn push(&self, msg: Arc<Msg>) -> Delivery {
        match self.mailbox.try_send(msg) {
            Ok(()) => Delivery::Accepted,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::trace!(
                    conn_id = self.conn_id,
                    user_id = %self.user_id(),
                    seq = %msg.seq,
                    "Mailbox full, message dropped"
                );
                Delivery::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Dropped,
        }
    }

    /// Claim the right to tear this channel down. Only the first caller gets `true`.
    pub fn begin_close(&self) -> bool {
        !self.closing.swap(true, Ordering::AcqRel)
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    /// Room this channel is currently linked into
    pub fn room(&self) -> Option<Arc<Room>> {
        self.link.lock().as_ref().and_then(|link| link.room.upgrade())
    }

    pub(crate) fn link(&self) -> Option<RoomLink> {
        self.link.lock().clone()
    }

    pub(crate) fn set_link(&self, link: Option<RoomLink>) {
        *self.link.lock() = link;
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("conn_id", &self.conn_id)
            .field("user_id", &self.user_id())
            .field("room_id", &self.room_id())
            .finish()
    }
}
