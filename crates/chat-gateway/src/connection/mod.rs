//! Connection state
//!
//! Channels, the rooms they join, and the buckets that shard both by user id.

mod bucket;
mod channel;
mod room;

pub(crate) use bucket::BucketIndex;
pub use bucket::{Bucket, BucketError, Departure};
pub(crate) use channel::RoomLink;
pub use channel::{Channel, Delivery, Mailbox};
pub use room::{Room, RoomError};
