//! Cluster topology as seen by the sender: which nodes run which services and which vbuckets
//! each data node owns.

use std::{fmt::Display, sync::Arc};

use async_trait::async_trait;
use hashbrown::HashSet;
use indexer_types::Vbucket;
use thiserror::Error;
use tokio::sync::Mutex;

/// Name of the service that serves mutation feeds.
pub const PROJECTOR_SERVICE: &str = "projector";

/// Identifies a node in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum TopologyError {
    #[error("failed to fetch cluster info: {0}")]
    Fetch(String),

    #[error("bucket {0} not found in cluster info")]
    UnknownBucket(String),

    #[error("node {0} not found in cluster info")]
    UnknownNode(NodeId),

    #[error("service {service} is not available on node {node}")]
    MissingService { node: NodeId, service: String },
}

/// A cache of the cluster's membership and vbucket map.
///
/// Reads only observe what the last [`ClusterInfo::fetch`] loaded; the cache is refreshed
/// before every lookup sequence.
#[async_trait]
pub trait ClusterInfo: Send + Sync + std::fmt::Debug {
    /// Refresh the cache, retrying internally up to the configured bound.
    async fn fetch(&mut self) -> Result<(), TopologyError>;

    /// Set the number of attempts [`ClusterInfo::fetch`] makes before giving up.
    fn set_max_retries(&mut self, max_retries: usize);

    /// Data nodes hosting `bucket`.
    fn nodes_by_bucket(&self, bucket: &str) -> Result<Vec<NodeId>, TopologyError>;

    /// Vbuckets of `bucket` that `node` currently owns.
    fn vbuckets(&self, node: &NodeId, bucket: &str) -> Result<Vec<Vbucket>, TopologyError>;

    fn nodes_by_service_type(&self, service: &str) -> Vec<NodeId>;

    fn service_address(&self, node: &NodeId, service: &str) -> Result<String, TopologyError>;

    /// The node this process runs on.
    fn current_node(&self) -> NodeId;
}

/// Shared handle to the [`ClusterInfo`] cache.
///
/// Every lookup refreshes the cache and reads from it under one lock, which is released
/// before the caller talks to any projector.
#[derive(Debug)]
pub struct Topology {
    cinfo: Mutex<Box<dyn ClusterInfo>>,
}

impl Topology {
    /// Wrap `cinfo`, performing the initial fetch.
    pub async fn new(
        mut cinfo: Box<dyn ClusterInfo>,
        max_retries: usize,
    ) -> Result<Self, TopologyError> {
        cinfo.set_max_retries(max_retries);
        cinfo.fetch().await?;
        Ok(Self {
            cinfo: Mutex::new(cinfo),
        })
    }

    /// Every vbucket of `bucket`, across all the data nodes hosting it.
    pub async fn vbuckets_for_bucket(&self, bucket: &str) -> Result<Vec<Vbucket>, TopologyError> {
        let mut cinfo = self.cinfo.lock().await;
        cinfo.fetch().await?;

        let mut vbnos = vec![];
        for node in cinfo.nodes_by_bucket(bucket)? {
            vbnos.extend(cinfo.vbuckets(&node, bucket)?);
        }
        Ok(vbnos)
    }

    /// Admin addresses of every projector in the cluster.
    pub async fn projector_addrs(&self) -> Result<Vec<String>, TopologyError> {
        let mut cinfo = self.cinfo.lock().await;
        cinfo.fetch().await?;

        cinfo
            .nodes_by_service_type(PROJECTOR_SERVICE)
            .iter()
            .map(|node| cinfo.service_address(node, PROJECTOR_SERVICE))
            .collect()
    }

    /// Admin addresses of the projectors owning at least one of `vbnos`.
    pub async fn projector_addrs_for_vbuckets(
        &self,
        bucket: &str,
        vbnos: &[Vbucket],
    ) -> Result<Vec<String>, TopologyError> {
        let mut cinfo = self.cinfo.lock().await;
        cinfo.fetch().await?;

        let wanted = vbnos.iter().copied().collect::<HashSet<_>>();
        let mut addrs = vec![];
        for node in cinfo.nodes_by_service_type(PROJECTOR_SERVICE) {
            let owned = cinfo.vbuckets(&node, bucket)?;
            if owned.iter().any(|vb| wanted.contains(vb)) {
                addrs.push(cinfo.service_address(&node, PROJECTOR_SERVICE)?);
            }
        }
        Ok(addrs)
    }

    /// Address of `service` on the node this process runs on.
    pub async fn current_node_service_address(
        &self,
        service: &str,
    ) -> Result<String, TopologyError> {
        let mut cinfo = self.cinfo.lock().await;
        cinfo.fetch().await?;

        let node = cinfo.current_node();
        cinfo.service_address(&node, service)
    }
}
