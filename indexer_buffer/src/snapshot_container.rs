//! In-memory ledger of the snapshots taken of an index.

use std::collections::VecDeque;

use indexer_types::TsVbuuid;

/// A snapshot position together with whatever the snapshot manager tracks about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo<M> {
    pub ts: TsVbuuid,
    pub metadata: M,
}

impl<M> SnapshotInfo<M> {
    pub fn new(ts: TsVbuuid, metadata: M) -> Self {
        Self { ts, metadata }
    }
}

/// Snapshots ordered newest-first.
///
/// The container never re-sorts: [`SnapshotInfoContainer::add`] places an entry at the newest
/// end, and callers add snapshots in the order they were taken. Lookups that search for an
/// older snapshot depend on that order.
#[derive(Debug, Clone)]
pub struct SnapshotInfoContainer<M> {
    entries: VecDeque<SnapshotInfo<M>>,
}

impl<M> Default for SnapshotInfoContainer<M> {
    fn default() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }
}

impl<M> SnapshotInfoContainer<M> {
    /// Build a container from `entries`, which must already be ordered newest-first.
    pub fn new(entries: impl IntoIterator<Item = SnapshotInfo<M>>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn add(&mut self, info: SnapshotInfo<M>) {
        self.entries.push_front(info);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_latest(&self) -> Option<&SnapshotInfo<M>> {
        self.entries.front()
    }

    /// The newest snapshot whose seqnos match `ts` for every vbucket.
    pub fn get_equal_to(&self, ts: &TsVbuuid) -> Option<&SnapshotInfo<M>> {
        self.entries.iter().find(|e| e.ts.equal_seqnos(ts))
    }

    /// The newest snapshot at or before `ts`.
    ///
    /// Snapshots newer than `ts` are skipped; the scan stops at the first snapshot that is not
    /// ahead of `ts`.
    pub fn get_older_or_equal_to(&self, ts: &TsVbuuid) -> Option<&SnapshotInfo<M>> {
        self.entries.iter().find(|e| ts.greater_than_equal(&e.ts))
    }

    pub fn remove_oldest(&mut self) -> Option<SnapshotInfo<M>> {
        self.entries.pop_back()
    }

    /// Drop every snapshot strictly ahead of `ts`, typically before rolling back to it.
    pub fn remove_newer_than(&mut self, ts: &TsVbuuid) {
        self.entries.retain(|e| !e.ts.greater_than(ts));
    }

    pub fn remove_all(&mut self) {
        self.entries.clear();
    }
}

impl<M: Clone> SnapshotInfoContainer<M> {
    /// A copy of the current entries, newest-first.
    pub fn list(&self) -> Vec<SnapshotInfo<M>> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use indexer_types::{SnapshotBounds, VbEntry, Vbucket};
    use pretty_assertions::assert_eq;

    use super::*;

    fn ts(seqnos: &[u64]) -> TsVbuuid {
        let mut ts = TsVbuuid::new("default");
        for (vb, seqno) in seqnos.iter().enumerate() {
            ts.append(
                Vbucket::new(vb as u16),
                VbEntry::new(*seqno, 1, SnapshotBounds::new(*seqno, *seqno)),
            );
        }
        ts
    }

    fn names(infos: &[SnapshotInfo<&'static str>]) -> Vec<&'static str> {
        infos.iter().map(|i| i.metadata).collect()
    }

    /// T1 < T2 < T3, added oldest first so the container reads T3, T2, T1.
    fn ledger() -> SnapshotInfoContainer<&'static str> {
        let mut c = SnapshotInfoContainer::default();
        c.add(SnapshotInfo::new(ts(&[10, 10]), "t1"));
        c.add(SnapshotInfo::new(ts(&[20, 20]), "t2"));
        c.add(SnapshotInfo::new(ts(&[30, 30]), "t3"));
        c
    }

    #[test]
    fn add_keeps_newest_first() {
        let c = ledger();
        assert_eq!(names(&c.list()), vec!["t3", "t2", "t1"]);
        assert_eq!(c.get_latest().unwrap().metadata, "t3");
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn older_or_equal_lookup() {
        let c = ledger();
        assert_eq!(c.get_older_or_equal_to(&ts(&[20, 20])).unwrap().metadata, "t2");
        assert_eq!(c.get_older_or_equal_to(&ts(&[25, 29])).unwrap().metadata, "t2");
        assert_eq!(c.get_older_or_equal_to(&ts(&[99, 99])).unwrap().metadata, "t3");
        assert!(c.get_older_or_equal_to(&ts(&[5, 5])).is_none());
    }

    #[test]
    fn equal_lookup() {
        let c = ledger();
        assert_eq!(c.get_equal_to(&ts(&[10, 10])).unwrap().metadata, "t1");
        assert!(c.get_equal_to(&ts(&[10, 11])).is_none());
    }

    #[test]
    fn remove_newer_than_keeps_target() {
        let mut c = ledger();
        c.remove_newer_than(&ts(&[10, 10]));
        assert_eq!(names(&c.list()), vec!["t1"]);

        let mut c = ledger();
        c.remove_newer_than(&ts(&[20, 20]));
        assert_eq!(names(&c.list()), vec!["t2", "t1"]);
    }

    #[test]
    fn remove_oldest_and_all() {
        let mut c = ledger();
        assert_eq!(c.remove_oldest().unwrap().metadata, "t1");
        assert_eq!(names(&c.list()), vec!["t3", "t2"]);

        c.remove_all();
        assert!(c.is_empty());
        assert!(c.get_latest().is_none());
        assert!(c.remove_oldest().is_none());
    }

    #[test]
    fn list_is_a_copy() {
        let mut c = ledger();
        let listed = c.list();
        c.remove_all();
        c.add(SnapshotInfo::new(ts(&[40, 40]), "t4"));
        assert_eq!(names(&listed), vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn construct_from_existing_list() {
        let c = SnapshotInfoContainer::new(ledger().list());
        assert_eq!(names(&c.list()), vec!["t3", "t2", "t1"]);
    }

    /// Metadata that cannot be cloned, such as an open snapshot handle.
    #[derive(Debug, PartialEq)]
    struct Handle(u32);

    #[test]
    fn metadata_need_not_be_clone() {
        let mut c = SnapshotInfoContainer::new([SnapshotInfo::new(ts(&[10]), Handle(1))]);
        c.add(SnapshotInfo::new(ts(&[20]), Handle(2)));
        assert_eq!(c.len(), 2);

        assert_eq!(c.get_latest().unwrap().metadata, Handle(2));
        assert_eq!(c.get_older_or_equal_to(&ts(&[15])).unwrap().metadata, Handle(1));
        assert_eq!(c.get_equal_to(&ts(&[20])).unwrap().metadata, Handle(2));

        c.remove_newer_than(&ts(&[10]));
        assert_eq!(c.remove_oldest().unwrap().metadata, Handle(1));
        assert!(c.is_empty());
    }
}
