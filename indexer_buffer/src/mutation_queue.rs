//! A multi-queue of [`MutationKeys`] with one FIFO per vbucket.

use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use futures::{StreamExt, stream::BoxStream};
use indexer_types::{MutationKeys, Seqno, Vbucket};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How often the streaming dequeue operations look for new mutations.
pub const DEQUEUE_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// The handle a queue stores for each mutation. The mutation itself is never copied.
pub type MutationRef = Arc<MutationKeys>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("vbucket {vbucket} out of range for a queue of {num_vbuckets} vbuckets")]
    VbucketOutOfRange { vbucket: Vbucket, num_vbuckets: u16 },
}

/// A set of per-vbucket mutation FIFOs.
///
/// Each vbucket supports one producer and one consumer acting concurrently. Vbuckets are
/// independent of each other; work on one never waits on another.
///
/// Reads of an out-of-range vbucket behave as reads of an empty queue.
pub trait MutationQueue: Send + Sync + Debug {
    /// Append `mutation` to the tail of `vbucket`'s queue. Never blocks.
    fn enqueue(&self, mutation: MutationRef, vbucket: Vbucket) -> Result<(), QueueError>;

    /// Stream `vbucket`'s mutations as they become available until the returned token is
    /// cancelled.
    ///
    /// The stream polls the queue every poll interval rather than waiting on a notification.
    /// Once the token is cancelled the stream ends and yields nothing further.
    fn dequeue(
        &self,
        vbucket: Vbucket,
    ) -> Result<(BoxStream<'_, MutationRef>, CancellationToken), QueueError>;

    /// Stream every mutation at the head of `vbucket`'s queue with a seqno at or below `seqno`.
    ///
    /// The stream ends when the head of the queue holds a mutation past `seqno`, which is left
    /// in place. It also ends when a poll finds the queue empty without having delivered
    /// anything since the previous poll: the caller is expected to have flushed every mutation
    /// up to `seqno` into the queue before draining it.
    fn dequeue_up_to_seqno(
        &self,
        vbucket: Vbucket,
        seqno: Seqno,
    ) -> Result<BoxStream<'_, MutationRef>, QueueError>;

    /// Remove and return the mutation at the head of `vbucket`'s queue, if any.
    fn dequeue_single_element(&self, vbucket: Vbucket) -> Option<MutationRef>;

    /// The mutation at the head of `vbucket`'s queue, left in place.
    fn peek_head(&self, vbucket: Vbucket) -> Option<MutationRef>;

    /// The mutation at the tail of `vbucket`'s queue, left in place.
    fn peek_tail(&self, vbucket: Vbucket) -> Option<MutationRef>;

    /// Number of mutations queued for `vbucket`.
    fn size(&self, vbucket: Vbucket) -> i64;

    fn num_vbuckets(&self) -> u16;
}

/// A [`MutationQueue`] backed by one linked node arena per vbucket.
///
/// Nodes are linked by index and recycled once the consumer has moved past them, so a queue
/// in steady state stops allocating. The arena of a vbucket is only ever touched by that
/// vbucket's producer and consumer; the size counter is kept outside it so that
/// [`MutationQueue::size`] is a single atomic load.
#[derive(Debug)]
pub struct ShardedMutationQueue {
    vbuckets: Box<[VbQueue]>,
    poll_interval: Duration,
}

impl ShardedMutationQueue {
    pub fn new(num_vbuckets: u16) -> Self {
        Self {
            vbuckets: (0..num_vbuckets).map(|_| VbQueue::new()).collect(),
            poll_interval: DEQUEUE_POLL_INTERVAL,
        }
    }

    /// Override the poll interval used by the streaming dequeue operations.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn vb_queue(&self, vbucket: Vbucket) -> Result<&VbQueue, QueueError> {
        self.vbuckets
            .get(vbucket.as_usize())
            .ok_or(QueueError::VbucketOutOfRange {
                vbucket,
                num_vbuckets: self.num_vbuckets(),
            })
    }

    /// Number of nodes ever allocated for `vbucket`, including the sentinel.
    #[cfg(test)]
    fn allocated_nodes(&self, vbucket: Vbucket) -> usize {
        self.vbuckets[vbucket.as_usize()].arena.lock().nodes.len()
    }
}

impl MutationQueue for ShardedMutationQueue {
    fn enqueue(&self, mutation: MutationRef, vbucket: Vbucket) -> Result<(), QueueError> {
        self.vb_queue(vbucket)?.push_back(mutation);
        Ok(())
    }

    fn dequeue(
        &self,
        vbucket: Vbucket,
    ) -> Result<(BoxStream<'_, MutationRef>, CancellationToken), QueueError> {
        let queue = self.vb_queue(vbucket)?;
        let poll_interval = self.poll_interval;
        let stop = CancellationToken::new();

        let stream = futures::stream::unfold(stop.clone(), move |stop| async move {
            loop {
                if stop.is_cancelled() {
                    return None;
                }
                if let Some(m) = queue.pop_front() {
                    return Some((m, stop));
                }
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => return None,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        });

        Ok((stream.boxed(), stop))
    }

    fn dequeue_up_to_seqno(
        &self,
        vbucket: Vbucket,
        seqno: Seqno,
    ) -> Result<BoxStream<'_, MutationRef>, QueueError> {
        let queue = self.vb_queue(vbucket)?;
        let poll_interval = self.poll_interval;

        // The state records whether the current poll has delivered anything yet.
        let stream = futures::stream::unfold(false, move |mut delivered| async move {
            loop {
                match queue.pop_front_if(|m| m.seqno() <= seqno) {
                    Pop::Taken(m) => return Some((m, true)),
                    Pop::Stopped => return None,
                    Pop::Empty if !delivered => return None,
                    Pop::Empty => {
                        delivered = false;
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        });

        Ok(stream.boxed())
    }

    fn dequeue_single_element(&self, vbucket: Vbucket) -> Option<MutationRef> {
        self.vb_queue(vbucket).ok()?.pop_front()
    }

    fn peek_head(&self, vbucket: Vbucket) -> Option<MutationRef> {
        self.vb_queue(vbucket).ok()?.arena.lock().front().cloned()
    }

    fn peek_tail(&self, vbucket: Vbucket) -> Option<MutationRef> {
        self.vb_queue(vbucket).ok()?.arena.lock().back().cloned()
    }

    fn size(&self, vbucket: Vbucket) -> i64 {
        self.vb_queue(vbucket)
            .map(|q| q.size.load(Ordering::Acquire))
            .unwrap_or_default()
    }

    fn num_vbuckets(&self) -> u16 {
        // construction takes a u16, so the length always fits
        self.vbuckets.len() as u16
    }
}

#[derive(Debug)]
struct VbQueue {
    arena: Mutex<NodeArena>,
    size: AtomicI64,
}

impl VbQueue {
    fn new() -> Self {
        Self {
            arena: Mutex::new(NodeArena::new()),
            size: AtomicI64::new(0),
        }
    }

    fn push_back(&self, mutation: MutationRef) {
        let mut arena = self.arena.lock();
        arena.push_back(mutation);
        self.size.fetch_add(1, Ordering::AcqRel);
    }

    fn pop_front(&self) -> Option<MutationRef> {
        match self.pop_front_if(|_| true) {
            Pop::Taken(m) => Some(m),
            Pop::Stopped | Pop::Empty => None,
        }
    }

    fn pop_front_if(&self, take: impl FnOnce(&MutationKeys) -> bool) -> Pop {
        let mut arena = self.arena.lock();
        let pop = arena.pop_front_if(take);
        if matches!(pop, Pop::Taken(_)) {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
        pop
    }
}

#[derive(Debug)]
enum Pop {
    Taken(MutationRef),
    /// The head of the queue did not satisfy the predicate.
    Stopped,
    Empty,
}

#[derive(Debug, Default)]
struct Node {
    mutation: Option<MutationRef>,
    next: Option<usize>,
}

/// Index-linked list of nodes.
///
/// `head` always points at a sentinel that holds no mutation; the queue is empty when
/// `head == tail`. Nodes from `free` up to (excluding) `head` have been consumed and are
/// reused, oldest first, before the arena grows.
#[derive(Debug)]
struct NodeArena {
    nodes: Vec<Node>,
    head: usize,
    tail: usize,
    free: usize,
}

impl NodeArena {
    fn new() -> Self {
        Self {
            nodes: vec![Node::default()],
            head: 0,
            tail: 0,
            free: 0,
        }
    }

    fn alloc(&mut self) -> usize {
        if self.free == self.head {
            self.nodes.push(Node::default());
            return self.nodes.len() - 1;
        }

        let n = self.free;
        self.free = self.nodes[n].next.unwrap_or(self.head);
        self.nodes[n] = Node::default();
        n
    }

    fn push_back(&mut self, mutation: MutationRef) {
        let n = self.alloc();
        self.nodes[n].mutation = Some(mutation);
        let tail = self.tail;
        self.nodes[tail].next = Some(n);
        self.tail = n;
    }

    fn first(&self) -> Option<usize> {
        if self.head == self.tail {
            return None;
        }
        self.nodes[self.head].next
    }

    fn front(&self) -> Option<&MutationRef> {
        self.nodes[self.first()?].mutation.as_ref()
    }

    fn back(&self) -> Option<&MutationRef> {
        if self.head == self.tail {
            return None;
        }
        self.nodes[self.tail].mutation.as_ref()
    }

    fn pop_front_if(&mut self, take: impl FnOnce(&MutationKeys) -> bool) -> Pop {
        let Some(first) = self.first() else {
            return Pop::Empty;
        };
        match &self.nodes[first].mutation {
            Some(m) if take(m) => {}
            Some(_) => return Pop::Stopped,
            None => return Pop::Empty,
        }

        // The first node becomes the new sentinel, so its payload moves out to the caller.
        let Some(m) = self.nodes[first].mutation.take() else {
            return Pop::Empty;
        };
        self.head = first;
        Pop::Taken(m)
    }
}
