//! Room membership for one room id within one bucket
//!
//! Members form a doubly-linked list threaded through an index-stable arena:
//! each node stores its neighbours' slot numbers, and a channel remembers its
//! own slot, so both insertion (at the head) and removal are O(1). Freed slots
//! are recycled. Traversal runs head to end only.

use chat_core::RoomId;
use parking_lot::RwLock;
use std::sync::Arc;

use super::channel::{Channel, Delivery, RoomLink};
use crate::protocol::Msg;

/// Room errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room emptied and was retired; it never accepts members again
    #[error("Room {0} has been dropped")]
    Dropped(RoomId),
}

struct Node {
    channel: Arc<Channel>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Default)]
struct Members {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: Option<usize>,
    online_count: usize,
    dropped: bool,
}

impl Members {
    fn alloc(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }
}

/// Channels in one bucket joined to the same room id
pub struct Room {
    id: RoomId,
    members: RwLock<Members>,
}

impl Room {
    pub fn new(id: RoomId) -> Arc<Self> {
        Arc::new(Self {
            id,
            members: RwLock::new(Members::default()),
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Insert `channel` at the head of the member list
    pub fn put(self: &Arc<Self>, channel: &Arc<Channel>) -> Result<(), RoomError> {
        let mut members = self.members.write();
        if members.dropped {
            return Err(RoomError::Dropped(self.id));
        }

        let old_head = members.head;
        let slot = members.alloc(Node {
            channel: Arc::clone(channel),
            prev: None,
            next: old_head,
        });
        if let Some(head) = old_head.and_then(|h| members.node_mut(h)) {
            head.prev = Some(slot);
        }
        members.head = Some(slot);
        members.online_count += 1;

        channel.set_link(Some(RoomLink {
            room: Arc::downgrade(self),
            slot,
        }));
        Ok(())
    }

    /// Unlink `channel` in O(1) using its recorded slot.
    ///
    /// Returns `true` when the room is now empty (and therefore dropped); the
    /// caller must then remove it from the bucket's room index. Removing a
    /// channel that is not a member changes nothing.
    pub fn remove(&self, channel: &Channel) -> bool {
        let mut members = self.members.write();

        let Some(link) = channel.link() else {
            return members.dropped;
        };
        let is_member = std::ptr::eq(link.room.as_ptr(), self)
            && members
                .nodes
                .get(link.slot)
                .and_then(Option::as_ref)
                .is_some_and(|node| std::ptr::eq(Arc::as_ptr(&node.channel), channel));
        if !is_member {
            return members.dropped;
        }

        let Some(node) = members.nodes[link.slot].take() else {
            return members.dropped;
        };
        match node.prev {
            Some(prev) => {
                if let Some(p) = members.node_mut(prev) {
                    p.next = node.next;
                }
            }
            None => members.head = node.next,
        }
        if let Some(n) = node.next.and_then(|next| members.node_mut(next)) {
            n.prev = node.prev;
        }

        members.free.push(link.slot);
        members.online_count -= 1;
        channel.set_link(None);

        if members.online_count == 0 {
            members.dropped = true;
        }
        members.dropped
    }

    /// Push `msg` to every member, head to end. Returns how many mailboxes accepted it.
    pub fn broadcast(&self, msg: &Arc<Msg>) -> usize {
        let members = self.members.read();
        let mut accepted = 0;
        let mut cursor = members.head;

        while let Some(node) = cursor.and_then(|slot| members.nodes.get(slot)).and_then(Option::as_ref) {
            if node.channel.push(Arc::clone(msg)) == Delivery::Accepted {
                accepted += 1;
            }
            cursor = node.next;
        }
        accepted
    }

    pub fn online_count(&self) -> usize {
        self.members.read().online_count
    }

    pub fn is_dropped(&self) -> bool {
        self.members.read().dropped
    }

    /// Members in traversal order
    pub fn members(&self) -> Vec<Arc<Channel>> {
        let members = self.members.read();
        let mut out = Vec::with_capacity(members.online_count);
        let mut cursor = members.head;

        while let Some(node) = cursor.and_then(|slot| members.nodes.get(slot)).and_then(Option::as_ref) {
            out.push(Arc::clone(&node.channel));
            cursor = node.next;
        }
        out
    }

    pub fn contains(&self, channel: &Channel) -> bool {
        channel
            .link()
            .is_some_and(|link| std::ptr::eq(link.room.as_ptr(), self))
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members = self.members.read();
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("online_count", &members.online_count)
            .field("dropped", &members.dropped)
            .finish()
    }
}
