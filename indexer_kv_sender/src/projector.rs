//! Admin interface of the projectors that serve mutation feeds.

use std::{fmt::Debug, sync::Arc};

use async_trait::async_trait;
use indexer_types::{FailoverLog, IndexInst, IndexInstId, TsVbuuid, Vbucket};
use thiserror::Error;

#[cfg(test)]
pub(crate) mod mock;

/// Endpoint type requested for every stream: mutations are pushed to the indexer's data port.
pub const DATAPORT_ENDPOINT: &str = "dataport";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectorError {
    /// The projector holds no topic with the requested name.
    #[error("topic missing")]
    TopicMissing,

    #[error("projector {0} unavailable")]
    Unavailable(String),

    #[error("projector request failed: {0}")]
    Request(String),
}

/// An index instance as sent to a projector, with the endpoints its mutations go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub inst: IndexInst,
    pub endpoints: Vec<String>,
}

/// What a projector reports after starting (or restarting) vbuckets on a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicResponse {
    /// Positions the projector is now streaming from.
    pub active_timestamps: Vec<TsVbuuid>,
    /// Positions the projector cannot stream from, with the highest safe point to roll back to.
    pub rollback_timestamps: Vec<TsVbuuid>,
}

/// Fold every non-empty timestamp of `bucket` in `timestamps` into `acc`.
pub(crate) fn union_for_bucket(
    acc: &mut Option<TsVbuuid>,
    timestamps: &[TsVbuuid],
    bucket: &str,
) {
    for ts in timestamps
        .iter()
        .filter(|ts| !ts.is_empty() && ts.bucket() == bucket)
    {
        match acc.as_mut() {
            Some(merged) => merged.union_with(ts),
            None => *acc = Some(ts.clone()),
        }
    }
}

/// A client for one projector's admin port.
#[async_trait]
pub trait ProjectorClient: Send + Sync + Debug {
    /// Start `topic` from `restart_timestamps`, feeding `instances`.
    async fn mutation_topic_request(
        &self,
        topic: &str,
        endpoint_type: &str,
        restart_timestamps: &[TsVbuuid],
        instances: &[InstanceDescriptor],
    ) -> Result<TopicResponse, ProjectorError>;

    /// Stop streaming the vbuckets in `timestamps`. Vbuckets that are not running are ignored.
    async fn shutdown_vbuckets(
        &self,
        topic: &str,
        timestamps: &[TsVbuuid],
    ) -> Result<(), ProjectorError>;

    async fn restart_vbuckets(
        &self,
        topic: &str,
        restart_timestamps: &[TsVbuuid],
    ) -> Result<TopicResponse, ProjectorError>;

    async fn add_instances(
        &self,
        topic: &str,
        instances: &[InstanceDescriptor],
    ) -> Result<(), ProjectorError>;

    async fn del_instances(
        &self,
        topic: &str,
        inst_ids: &[IndexInstId],
    ) -> Result<(), ProjectorError>;

    async fn del_buckets(&self, topic: &str, buckets: &[String]) -> Result<(), ProjectorError>;

    async fn shutdown_topic(&self, topic: &str) -> Result<(), ProjectorError>;

    async fn get_failover_logs(
        &self,
        pool: &str,
        bucket: &str,
        vbnos: &[Vbucket],
    ) -> Result<FailoverLog, ProjectorError>;
}

/// Hands out a [`ProjectorClient`] for a projector admin address.
///
/// Clients must not retry on their own; retries are driven by the sender.
pub trait ProjectorClientFactory: Send + Sync + Debug {
    fn client(&self, addr: &str) -> Arc<dyn ProjectorClient>;
}
