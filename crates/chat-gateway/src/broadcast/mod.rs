//! Room broadcast workers
//!
//! Each bucket runs a fixed pool of workers. A room broadcast is queued to
//! one of them instead of being fanned out inline by the caller.

mod worker;

pub(crate) use worker::{spawn_workers, BroadcastJob};
