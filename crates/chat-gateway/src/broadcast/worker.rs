//! Broadcast worker loop

use chat_core::RoomId;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::connection::BucketIndex;
use crate::protocol::Msg;

/// A queued room broadcast
#[derive(Debug)]
pub(crate) struct BroadcastJob {
    pub(crate) room_id: RoomId,
    pub(crate) msg: Arc<Msg>,
}

/// Spawn `amount` workers reading from queues of depth `queue_size`.
///
/// Workers exit once their sender is dropped.
pub(crate) fn spawn_workers(
    bucket: usize,
    index: &Arc<RwLock<BucketIndex>>,
    amount: usize,
    queue_size: usize,
) -> Vec<mpsc::Sender<BroadcastJob>> {
    (0..amount.max(1))
        .map(|worker| {
            let (tx, rx) = mpsc::channel(queue_size.max(1));
            tokio::spawn(run_worker(bucket, worker, Arc::clone(index), rx));
            tx
        })
        .collect()
}

async fn run_worker(
    bucket: usize,
    worker: usize,
    index: Arc<RwLock<BucketIndex>>,
    mut jobs: mpsc::Receiver<BroadcastJob>,
) {
    while let Some(job) = jobs.recv().await {
        // Resolve under the bucket lock, traverse under the room lock only
        let room = index.read().room(job.room_id);
        match room {
            Some(room) => {
                let accepted = room.broadcast(&job.msg);
                tracing::trace!(
                    bucket,
                    worker,
                    room_id = %job.room_id,
                    accepted,
                    "Room broadcast delivered"
                );
            }
            None => {
                tracing::trace!(bucket, worker, room_id = %job.room_id, "Broadcast to absent room dropped");
            }
        }
    }
    tracing::debug!(bucket, worker, "Broadcast worker stopped");
}
