//! Per-vbucket stream positions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Seqno, Vbucket};

/// Start and end seqno of the last snapshot a producer sent for a vbucket.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SnapshotBounds {
    pub start: u64,
    pub end: u64,
}

impl SnapshotBounds {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

/// Position of a single vbucket: the seqno reached, the epoch (vbuuid) it was reached in and
/// the snapshot it belongs to.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct VbEntry {
    pub seqno: Seqno,
    pub vbuuid: u64,
    pub snapshot: SnapshotBounds,
}

impl VbEntry {
    pub fn new(seqno: u64, vbuuid: u64, snapshot: SnapshotBounds) -> Self {
        Self {
            seqno: Seqno::new(seqno),
            vbuuid,
            snapshot,
        }
    }
}

/// A restart (or rollback) timestamp for one bucket.
///
/// Only the vbuckets that have been appended are present; a vbucket that is absent compares as
/// seqno 0. Entries are kept ordered by vbucket.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TsVbuuid {
    bucket: String,
    entries: BTreeMap<Vbucket, VbEntry>,
}

impl TsVbuuid {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Build the position a brand new stream starts from: seqno 0 in the oldest epoch of every
    /// vbucket in `failover_log`.
    pub fn initial_restart_ts(bucket: impl Into<String>, failover_log: &FailoverLog) -> Self {
        let mut ts = Self::new(bucket);
        for (vb, history) in failover_log.iter() {
            let vbuuid = history.last().map(|e| e.vbuuid).unwrap_or_default();
            ts.append(*vb, VbEntry::new(0, vbuuid, SnapshotBounds::default()));
        }
        ts
    }

    /// Derive the restart position for `vbnos` from a previously recorded timestamp.
    ///
    /// Streams resume from the end of the last complete snapshot, so the seqno of each entry is
    /// taken from its snapshot end. Vbuckets unknown to `self` restart from zero.
    pub fn restart_from(&self, vbnos: &[Vbucket]) -> Self {
        let mut ts = Self::new(self.bucket.clone());
        for vb in vbnos {
            let prev = self.entries.get(vb).copied().unwrap_or_default();
            ts.append(
                *vb,
                VbEntry::new(prev.snapshot.end, prev.vbuuid, prev.snapshot),
            );
        }
        ts
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Insert or replace the entry for `vb`.
    pub fn append(&mut self, vb: Vbucket, entry: VbEntry) {
        self.entries.insert(vb, entry);
    }

    pub fn get(&self, vb: Vbucket) -> Option<&VbEntry> {
        self.entries.get(&vb)
    }

    /// The seqno recorded for `vb`, zero if absent.
    pub fn seqno(&self, vb: Vbucket) -> Seqno {
        self.entries.get(&vb).map(|e| e.seqno).unwrap_or_default()
    }

    pub fn contains(&self, vb: Vbucket) -> bool {
        self.entries.contains_key(&vb)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn vbnos(&self) -> Vec<Vbucket> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vbucket, &VbEntry)> {
        self.entries.iter()
    }

    /// Fold `other` into `self`, keeping the entry with the higher seqno for every vbucket.
    pub fn union_with(&mut self, other: &Self) {
        for (vb, entry) in &other.entries {
            match self.entries.get(vb) {
                Some(existing) if existing.seqno >= entry.seqno => {}
                _ => {
                    self.entries.insert(*vb, *entry);
                }
            }
        }
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut ts = self.clone();
        ts.union_with(other);
        ts
    }

    /// True if both timestamps hold the same seqno for every vbucket either of them knows.
    pub fn equal_seqnos(&self, other: &Self) -> bool {
        self.all_vbnos(other)
            .all(|vb| self.seqno(vb) == other.seqno(vb))
    }

    /// True if every vbucket in `self` is at or past the same vbucket in `other`.
    pub fn greater_than_equal(&self, other: &Self) -> bool {
        self.all_vbnos(other)
            .all(|vb| self.seqno(vb) >= other.seqno(vb))
    }

    /// True if `self` is at or past `other` everywhere and strictly past it somewhere.
    pub fn greater_than(&self, other: &Self) -> bool {
        self.greater_than_equal(other) && !self.equal_seqnos(other)
    }

    fn all_vbnos<'a>(&'a self, other: &'a Self) -> impl Iterator<Item = Vbucket> + 'a {
        self.entries
            .keys()
            .chain(other.entries.keys().filter(|vb| !self.entries.contains_key(vb)))
            .copied()
    }
}

/// One epoch change in a vbucket's history.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct FailoverEntry {
    pub vbuuid: u64,
    pub seqno: u64,
}

impl FailoverEntry {
    pub fn new(vbuuid: u64, seqno: u64) -> Self {
        Self { vbuuid, seqno }
    }
}

/// Failover history of a set of vbuckets, each history ordered newest-first.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FailoverLog {
    logs: BTreeMap<Vbucket, Vec<FailoverEntry>>,
}

impl FailoverLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, vb: Vbucket, history: Vec<FailoverEntry>) {
        self.logs.insert(vb, history);
    }

    pub fn get(&self, vb: Vbucket) -> Option<&[FailoverEntry]> {
        self.logs.get(&vb).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Vbucket, &Vec<FailoverEntry>)> {
        self.logs.iter()
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}
