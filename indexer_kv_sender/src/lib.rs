//! Control of the mutation streams that feed the indexer.
//!
//! A [`KvSender`] accepts stream control commands through a [`KvSenderHandle`] and carries each
//! one out against every projector that serves the stream's bucket:
//!
//! * the cluster [`Topology`] resolves which projectors own which vbuckets,
//! * requests are fanned out through a [`ProjectorClient`] per projector,
//! * failed fan-outs are retried with a linearly growing backoff,
//! * the aggregate result is classified into a single [`KvSenderResponse`]: success, a rollback
//!   the caller must perform, a stream that needs repair, or a fatal error.

pub mod message;
pub mod projector;
pub mod retry;
pub mod sender;
pub mod topology;

pub use message::{
    ErrorCode, ErrorInfo, KvSenderCommand, KvSenderResponse, Reply, ResponseHandle, SendError,
    Severity, StreamRequestError,
};
pub use projector::{
    InstanceDescriptor, ProjectorClient, ProjectorClientFactory, ProjectorError, TopicResponse,
};
pub use retry::RetryConfig;
pub use sender::{Config, KvSender, KvSenderHandle};
pub use topology::{ClusterInfo, NodeId, Topology, TopologyError};
