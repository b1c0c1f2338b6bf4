use std::collections::VecDeque;

use hashbrown::HashMap;
use indexer_types::{FailoverEntry, SnapshotBounds, VbEntry};
use parking_lot::Mutex;

use super::*;

/// A request observed by a [`MockProjectorClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProjectorCall {
    MutationTopic {
        topic: String,
        restart_timestamps: Vec<TsVbuuid>,
        instances: Vec<InstanceDescriptor>,
    },
    ShutdownVbuckets {
        topic: String,
        timestamps: Vec<TsVbuuid>,
    },
    RestartVbuckets {
        topic: String,
        restart_timestamps: Vec<TsVbuuid>,
    },
    AddInstances {
        topic: String,
        instances: Vec<InstanceDescriptor>,
    },
    DelInstances {
        topic: String,
        inst_ids: Vec<IndexInstId>,
    },
    DelBuckets {
        topic: String,
        buckets: Vec<String>,
    },
    ShutdownTopic {
        topic: String,
    },
    FailoverLogs {
        bucket: String,
        vbnos: Vec<Vbucket>,
    },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<ProjectorCall>,
    topic_ret: VecDeque<Result<TopicResponse, ProjectorError>>,
    shutdown_vbuckets_ret: VecDeque<Result<(), ProjectorError>>,
    ack_ret: VecDeque<Result<(), ProjectorError>>,
    failover_ret: VecDeque<Result<FailoverLog, ProjectorError>>,
}

/// A mock projector owning a fixed set of vbuckets.
///
/// Canned returns are consumed in order. Once they run out the mock behaves like a healthy
/// projector: topic and restart requests report the owned vbuckets as active, every other
/// request succeeds.
#[derive(Debug, Default)]
pub(crate) struct MockProjectorClient {
    owned: Vec<Vbucket>,
    state: Mutex<State>,
}

impl MockProjectorClient {
    pub(crate) fn new(owned: std::ops::Range<u16>) -> Self {
        Self {
            owned: owned.map(Vbucket::new).collect(),
            state: Default::default(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<ProjectorCall> {
        self.state.lock().calls.clone()
    }

    /// Responses for [`ProjectorClient::mutation_topic_request`] and
    /// [`ProjectorClient::restart_vbuckets`].
    pub(crate) fn with_topic_ret(
        self,
        ret: impl Into<VecDeque<Result<TopicResponse, ProjectorError>>>,
    ) -> Self {
        self.state.lock().topic_ret = ret.into();
        self
    }

    pub(crate) fn with_shutdown_vbuckets_ret(
        self,
        ret: impl Into<VecDeque<Result<(), ProjectorError>>>,
    ) -> Self {
        self.state.lock().shutdown_vbuckets_ret = ret.into();
        self
    }

    /// Responses for the add, delete and shutdown topic requests.
    pub(crate) fn with_ack_ret(self, ret: impl Into<VecDeque<Result<(), ProjectorError>>>) -> Self {
        self.state.lock().ack_ret = ret.into();
        self
    }

    pub(crate) fn with_failover_ret(
        self,
        ret: impl Into<VecDeque<Result<FailoverLog, ProjectorError>>>,
    ) -> Self {
        self.state.lock().failover_ret = ret.into();
        self
    }

    /// Every entry of `timestamps` for a vbucket this projector owns.
    fn owned_part(&self, timestamps: &[TsVbuuid]) -> TopicResponse {
        let active_timestamps = timestamps
            .iter()
            .map(|ts| {
                let mut owned = TsVbuuid::new(ts.bucket());
                for (vb, entry) in ts.iter().filter(|(vb, _)| self.owned.contains(vb)) {
                    owned.append(*vb, *entry);
                }
                owned
            })
            .collect();
        TopicResponse {
            active_timestamps,
            rollback_timestamps: vec![],
        }
    }

    fn topic_ret(
        &self,
        call: ProjectorCall,
        timestamps: &[TsVbuuid],
    ) -> Result<TopicResponse, ProjectorError> {
        let mut guard = self.state.lock();
        guard.calls.push(call);
        guard
            .topic_ret
            .pop_front()
            .unwrap_or_else(|| Ok(self.owned_part(timestamps)))
    }

    fn ack_ret(&self, call: ProjectorCall) -> Result<(), ProjectorError> {
        let mut guard = self.state.lock();
        guard.calls.push(call);
        guard.ack_ret.pop_front().unwrap_or(Ok(()))
    }
}

#[async_trait]
impl ProjectorClient for MockProjectorClient {
    async fn mutation_topic_request(
        &self,
        topic: &str,
        _endpoint_type: &str,
        restart_timestamps: &[TsVbuuid],
        instances: &[InstanceDescriptor],
    ) -> Result<TopicResponse, ProjectorError> {
        self.topic_ret(
            ProjectorCall::MutationTopic {
                topic: topic.to_string(),
                restart_timestamps: restart_timestamps.to_vec(),
                instances: instances.to_vec(),
            },
            restart_timestamps,
        )
    }

    async fn shutdown_vbuckets(
        &self,
        topic: &str,
        timestamps: &[TsVbuuid],
    ) -> Result<(), ProjectorError> {
        let mut guard = self.state.lock();
        guard.calls.push(ProjectorCall::ShutdownVbuckets {
            topic: topic.to_string(),
            timestamps: timestamps.to_vec(),
        });
        guard.shutdown_vbuckets_ret.pop_front().unwrap_or(Ok(()))
    }

    async fn restart_vbuckets(
        &self,
        topic: &str,
        restart_timestamps: &[TsVbuuid],
    ) -> Result<TopicResponse, ProjectorError> {
        self.topic_ret(
            ProjectorCall::RestartVbuckets {
                topic: topic.to_string(),
                restart_timestamps: restart_timestamps.to_vec(),
            },
            restart_timestamps,
        )
    }

    async fn add_instances(
        &self,
        topic: &str,
        instances: &[InstanceDescriptor],
    ) -> Result<(), ProjectorError> {
        self.ack_ret(ProjectorCall::AddInstances {
            topic: topic.to_string(),
            instances: instances.to_vec(),
        })
    }

    async fn del_instances(
        &self,
        topic: &str,
        inst_ids: &[IndexInstId],
    ) -> Result<(), ProjectorError> {
        self.ack_ret(ProjectorCall::DelInstances {
            topic: topic.to_string(),
            inst_ids: inst_ids.to_vec(),
        })
    }

    async fn del_buckets(&self, topic: &str, buckets: &[String]) -> Result<(), ProjectorError> {
        self.ack_ret(ProjectorCall::DelBuckets {
            topic: topic.to_string(),
            buckets: buckets.to_vec(),
        })
    }

    async fn shutdown_topic(&self, topic: &str) -> Result<(), ProjectorError> {
        self.ack_ret(ProjectorCall::ShutdownTopic {
            topic: topic.to_string(),
        })
    }

    async fn get_failover_logs(
        &self,
        _pool: &str,
        bucket: &str,
        vbnos: &[Vbucket],
    ) -> Result<FailoverLog, ProjectorError> {
        let mut guard = self.state.lock();
        guard.calls.push(ProjectorCall::FailoverLogs {
            bucket: bucket.to_string(),
            vbnos: vbnos.to_vec(),
        });
        guard.failover_ret.pop_front().unwrap_or_else(|| {
            let mut flog = FailoverLog::new();
            for vb in vbnos {
                flog.insert(*vb, vec![FailoverEntry::new(failover_vbuuid(*vb), 0)]);
            }
            Ok(flog)
        })
    }
}

/// The vbuuid the default failover log reports for `vb`.
pub(crate) fn failover_vbuuid(vb: Vbucket) -> u64 {
    1_000 + u64::from(vb.get())
}

/// Build a timestamp of `bucket` from `(vbucket, seqno)` pairs.
pub(crate) fn ts(bucket: &str, seqnos: &[(u16, u64)]) -> TsVbuuid {
    let mut ts = TsVbuuid::new(bucket);
    for (vb, seqno) in seqnos {
        ts.append(
            Vbucket::new(*vb),
            VbEntry::new(*seqno, 1, SnapshotBounds::new(*seqno, *seqno)),
        );
    }
    ts
}

/// Serves a fixed set of [`MockProjectorClient`]s by address.
#[derive(Debug, Default)]
pub(crate) struct MockProjectorFactory {
    clients: HashMap<String, Arc<MockProjectorClient>>,
}

impl MockProjectorFactory {
    pub(crate) fn with_client(mut self, addr: &str, client: Arc<MockProjectorClient>) -> Self {
        self.clients.insert(addr.to_string(), client);
        self
    }
}

impl ProjectorClientFactory for MockProjectorFactory {
    fn client(&self, addr: &str) -> Arc<dyn ProjectorClient> {
        match self.clients.get(addr) {
            Some(c) => Arc::clone(c) as Arc<dyn ProjectorClient>,
            None => Arc::new(MockProjectorClient::default()),
        }
    }
}
