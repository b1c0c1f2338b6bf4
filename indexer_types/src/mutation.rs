//! Change events delivered by the upstream mutation feed.

use bytes::Bytes;

use crate::{IndexInstId, Seqno, Vbucket};

/// What a single index projection asks the indexer to do with a document.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MutationCommand {
    Upsert,
    Deletion,
    UpsertDeletion,
    Sync,
    DropData,
    StreamBegin,
    StreamEnd,
}

/// Where a [`MutationKeys`] came from.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MutationMeta {
    pub bucket: String,
    pub vbucket: Vbucket,
    pub vbuuid: u64,
    pub seqno: Seqno,
}

/// The secondary key projection of one document for one index instance.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Mutation {
    pub inst_id: IndexInstId,
    pub command: MutationCommand,
    pub key: Bytes,
    pub partition_key: Bytes,
}

/// One change to one document, along with every index projection it affects.
///
/// Once a `MutationKeys` is handed to a mutation queue it is not copied; the consumer that
/// dequeues it takes over the reference.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MutationKeys {
    pub meta: MutationMeta,
    pub docid: Bytes,
    pub mutations: Vec<Mutation>,
}

impl MutationKeys {
    pub fn new(meta: MutationMeta, docid: impl Into<Bytes>) -> Self {
        Self {
            meta,
            docid: docid.into(),
            mutations: vec![],
        }
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn vbucket(&self) -> Vbucket {
        self.meta.vbucket
    }

    pub fn seqno(&self) -> Seqno {
        self.meta.seqno
    }
}
