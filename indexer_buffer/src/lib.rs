//! In-memory buffering between the mutation feed and the index writers.
//!
//! * [`MutationQueue`] holds one FIFO per vbucket. The feed appends to it as mutations arrive and
//!   the index writers drain it, either continuously or up to a seqno watermark when building a
//!   consistent snapshot.
//! * [`SnapshotInfoContainer`] records the snapshots taken so far, newest first, so the rollback
//!   logic can find the most recent snapshot at or before a given timestamp.

pub mod mutation_queue;
pub mod snapshot_container;

pub use mutation_queue::{
    DEQUEUE_POLL_INTERVAL, MutationQueue, MutationRef, QueueError, ShardedMutationQueue,
};
pub use snapshot_container::{SnapshotInfo, SnapshotInfoContainer};
