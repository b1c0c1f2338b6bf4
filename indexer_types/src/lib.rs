//! Shared data types for the secondary indexer's ingestion path.
//!
//! The types in this crate describe the upstream key-value store as the indexer sees it: a bucket
//! is split into a fixed number of [`Vbucket`]s, each of which carries an independent, monotonic
//! stream of [`Seqno`]s. Positions in those streams are captured by a [`TsVbuuid`] and the change
//! events themselves arrive as [`MutationKeys`].

use std::fmt::Display;

use serde::{Deserialize, Serialize};

mod index;
mod mutation;
mod timestamp;

pub use index::{IndexDefn, IndexDefnId, IndexInst, IndexInstId, IndexState};
pub use mutation::{Mutation, MutationCommand, MutationKeys, MutationMeta};
pub use timestamp::{FailoverEntry, FailoverLog, SnapshotBounds, TsVbuuid, VbEntry};

/// The name of the pool every bucket lives in.
pub const DEFAULT_POOL: &str = "default";

/// A single partition (vbucket) of a bucket's key space.
#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
pub struct Vbucket(u16);

impl Vbucket {
    pub const fn new(v: u16) -> Self {
        Self(v)
    }

    pub fn get(&self) -> u16 {
        self.0
    }

    /// The vbucket as an index into per-vbucket arrays.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

impl From<u16> for Vbucket {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl Display for Vbucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sequence number within one vbucket's mutation stream.
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash,
)]
pub struct Seqno(u64);

impl Seqno {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for Seqno {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Seqno {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The mutation streams an indexer maintains against the upstream producers.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum StreamId {
    /// Long-lived stream keeping built indexes up to date.
    Maint,
    /// Stream used to catch an index up with the maintenance stream.
    Catchup,
    /// Stream used for the initial build of new indexes.
    Init,
}

impl StreamId {
    /// Name of the producer-side topic backing this stream.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Maint => "MAINT_STREAM_TOPIC",
            Self::Catchup => "CATCHUP_STREAM_TOPIC",
            Self::Init => "INIT_STREAM_TOPIC",
        }
    }

    /// Name of the indexer service that receives this stream's mutations.
    pub fn endpoint_service(&self) -> &'static str {
        match self {
            Self::Maint => "indexStreamMaint",
            Self::Catchup => "indexStreamCatchup",
            Self::Init => "indexStreamInit",
        }
    }
}

impl Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Maint => write!(f, "MAINT_STREAM"),
            Self::Catchup => write!(f, "CATCHUP_STREAM"),
            Self::Init => write!(f, "INIT_STREAM"),
        }
    }
}
