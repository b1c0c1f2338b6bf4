//! Index definitions and instances as the ingestion path needs to know them.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
pub struct IndexDefnId(u64);

impl IndexDefnId {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for IndexDefnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialOrd, Ord, PartialEq, Serialize, Deserialize, Hash)]
pub struct IndexInstId(u64);

impl IndexInstId {
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for IndexInstId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of an index instance.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum IndexState {
    #[default]
    Created,
    Ready,
    Initial,
    Catchup,
    Active,
    Deleted,
    Error,
}

/// The user-facing definition of a secondary index.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexDefn {
    pub defn_id: IndexDefnId,
    pub name: String,
    pub bucket: String,
    pub is_primary: bool,
    pub sec_exprs: Vec<String>,
    pub partition_key: String,
    pub where_expr: String,
}

impl IndexDefn {
    pub fn new(defn_id: IndexDefnId, name: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            defn_id,
            name: name.into(),
            bucket: bucket.into(),
            is_primary: false,
            sec_exprs: vec![],
            partition_key: String::new(),
            where_expr: String::new(),
        }
    }

    pub fn with_sec_exprs(mut self, exprs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.sec_exprs = exprs.into_iter().map(Into::into).collect();
        self
    }
}

/// A concrete instance of an [`IndexDefn`] hosted by this indexer.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexInst {
    pub inst_id: IndexInstId,
    pub defn: IndexDefn,
    pub state: IndexState,
}

impl IndexInst {
    pub fn new(inst_id: IndexInstId, defn: IndexDefn) -> Self {
        Self {
            inst_id,
            defn,
            state: IndexState::default(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.defn.bucket
    }
}
