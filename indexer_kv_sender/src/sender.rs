//! The stream control actor.
//!
//! A [`KvSender`] owns a bounded inbox of [`KvSenderCommand`]s. Commands are dispatched one at
//! a time: each is handed to its own task and acknowledged immediately, so the dispatch loop
//! never waits on a projector. The task reports its outcome on the command's [`Reply`].

use std::sync::Arc;

use async_trait::async_trait;
use indexer_types::{DEFAULT_POOL, IndexInst, IndexInstId, StreamId, TsVbuuid, Vbucket};
use metric::{Metric, U64Counter};
use observability_deps::tracing::{debug, error, info, warn};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    message::{
        KvSenderCommand, KvSenderResponse, Reply, ResponseHandle, SendError, StreamRequestError,
    },
    projector::{
        DATAPORT_ENDPOINT, InstanceDescriptor, ProjectorClient, ProjectorClientFactory,
        ProjectorError, union_for_bucket,
    },
    retry::{Attempt, RetryConfig, RetryHelper},
    topology::{ClusterInfo, Topology},
};

/// Attempts the cluster info cache makes to refresh itself before reporting a failure.
pub const MAX_CLUSTER_FETCH_RETRY: usize = 600;

pub const DEFAULT_COMMAND_BUFFER: usize = 64;

pub const DEFAULT_NUM_VBUCKETS: u16 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of vbuckets per bucket. Restart requests naming a vbucket outside this range are
    /// rejected.
    pub num_vbuckets: u16,
    pub retry: RetryConfig,
    pub cluster_fetch_max_retries: usize,
    /// Depth of the command inbox.
    pub command_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_vbuckets: DEFAULT_NUM_VBUCKETS,
            retry: RetryConfig::default(),
            cluster_fetch_max_retries: MAX_CLUSTER_FETCH_RETRY,
            command_buffer: DEFAULT_COMMAND_BUFFER,
        }
    }
}

type Envelope = (KvSenderCommand, oneshot::Sender<()>);

/// Opens, maintains and closes mutation streams against the cluster's projectors.
#[derive(Debug)]
pub struct KvSender {
    inner: Arc<Inner>,
    commands: mpsc::Receiver<Envelope>,
    tasks: TaskTracker,
}

impl KvSender {
    /// Build a sender, loading the cluster topology.
    ///
    /// A sender cannot operate without topology, so an error here should be treated as fatal
    /// by the caller.
    pub async fn new(
        config: Config,
        cinfo: Box<dyn ClusterInfo>,
        projectors: Arc<dyn ProjectorClientFactory>,
        metrics: &metric::Registry,
    ) -> Result<(Self, KvSenderHandle), StreamRequestError> {
        let topology = Topology::new(cinfo, config.cluster_fetch_max_retries).await?;
        let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

        let sender = Self {
            inner: Arc::new(Inner {
                config,
                topology,
                projectors,
                metrics: Metrics::new(metrics),
            }),
            commands: rx,
            tasks: TaskTracker::new(),
        };

        Ok((sender, KvSenderHandle { tx }))
    }

    /// Run the dispatch loop on a new task.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Dispatch commands until [`KvSenderCommand::Shutdown`] is received or every
    /// [`KvSenderHandle`] is dropped, then wait for the dispatched requests to complete.
    pub async fn run(mut self) {
        info!("kv sender started");

        while let Some((cmd, ack)) = self.commands.recv().await {
            if matches!(cmd, KvSenderCommand::Shutdown) {
                info!("kv sender shutting down");
                let _ = ack.send(());
                break;
            }

            self.dispatch(cmd);
            let _ = ack.send(());
        }

        self.tasks.close();
        self.tasks.wait().await;
        info!("kv sender stopped");
    }

    fn dispatch(&self, cmd: KvSenderCommand) {
        let op = cmd.name();
        let inner = Arc::clone(&self.inner);

        match cmd {
            KvSenderCommand::OpenStream {
                stream_id,
                index_list,
                restart_ts,
                reply,
            } => {
                info!(
                    %stream_id,
                    indexes = index_list.len(),
                    from_restart_ts = restart_ts.is_some(),
                    "open stream"
                );
                self.tasks.spawn(async move {
                    let resp = inner
                        .open_stream(op, stream_id, index_list, restart_ts, reply.stop_token())
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::AddIndexListToStream {
                stream_id,
                index_list,
                reply,
            } => {
                debug!(%stream_id, indexes = index_list.len(), "add index list to stream");
                self.tasks.spawn(async move {
                    let resp = inner
                        .add_index_list(op, stream_id, index_list, reply.stop_token())
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::RemoveIndexListFromStream {
                stream_id,
                index_list,
                reply,
            } => {
                debug!(%stream_id, indexes = index_list.len(), "remove index list from stream");
                self.tasks.spawn(async move {
                    let inst_ids = index_list.iter().map(|i| i.inst_id).collect::<Vec<_>>();
                    let resp = inner
                        .fan_out(
                            op,
                            stream_id,
                            TopicRequest::DelInstances(&inst_ids),
                            reply.stop_token(),
                        )
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::RemoveBucketFromStream {
                stream_id,
                bucket,
                reply,
            } => {
                debug!(%stream_id, %bucket, "remove bucket from stream");
                self.tasks.spawn(async move {
                    let buckets = vec![bucket];
                    let resp = inner
                        .fan_out(
                            op,
                            stream_id,
                            TopicRequest::DelBuckets(&buckets),
                            reply.stop_token(),
                        )
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::CloseStream { stream_id, reply } => {
                info!(%stream_id, "close stream");
                self.tasks.spawn(async move {
                    let resp = inner
                        .fan_out(
                            op,
                            stream_id,
                            TopicRequest::ShutdownTopic,
                            reply.stop_token(),
                        )
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::RestartVbuckets {
                stream_id,
                restart_ts,
                reply,
            } => {
                info!(
                    %stream_id,
                    bucket = restart_ts.bucket(),
                    vbuckets = restart_ts.len(),
                    "restart vbuckets"
                );
                self.tasks.spawn(async move {
                    let resp = inner
                        .restart_vbuckets(op, stream_id, restart_ts, reply.stop_token())
                        .await;
                    inner.respond(op, reply, resp);
                });
            }
            KvSenderCommand::Shutdown => {}
        }
    }
}

/// Submits commands to a running [`KvSender`].
#[derive(Debug, Clone)]
pub struct KvSenderHandle {
    tx: mpsc::Sender<Envelope>,
}

impl KvSenderHandle {
    /// Hand `cmd` to the sender, returning once it has been dispatched.
    pub async fn send(&self, cmd: KvSenderCommand) -> Result<(), SendError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((cmd, ack_tx))
            .await
            .map_err(|_| SendError::Closed)?;
        ack_rx.await.map_err(|_| SendError::NoAck)
    }

    async fn request<F>(&self, build: F) -> Result<ResponseHandle, SendError>
    where
        F: FnOnce(Reply) -> KvSenderCommand + Send,
    {
        let (reply, handle) = Reply::channel();
        self.send(build(reply)).await?;
        Ok(handle)
    }

    pub async fn open_stream(
        &self,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        restart_ts: Option<TsVbuuid>,
    ) -> Result<ResponseHandle, SendError> {
        self.request(|reply| KvSenderCommand::OpenStream {
            stream_id,
            index_list,
            restart_ts,
            reply,
        })
        .await
    }

    pub async fn add_index_list_to_stream(
        &self,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
    ) -> Result<ResponseHandle, SendError> {
        self.request(|reply| KvSenderCommand::AddIndexListToStream {
            stream_id,
            index_list,
            reply,
        })
        .await
    }

    pub async fn remove_index_list_from_stream(
        &self,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
    ) -> Result<ResponseHandle, SendError> {
        self.request(|reply| KvSenderCommand::RemoveIndexListFromStream {
            stream_id,
            index_list,
            reply,
        })
        .await
    }

    pub async fn remove_bucket_from_stream(
        &self,
        stream_id: StreamId,
        bucket: impl Into<String> + Send,
    ) -> Result<ResponseHandle, SendError> {
        let bucket = bucket.into();
        self.request(|reply| KvSenderCommand::RemoveBucketFromStream {
            stream_id,
            bucket,
            reply,
        })
        .await
    }

    pub async fn close_stream(&self, stream_id: StreamId) -> Result<ResponseHandle, SendError> {
        self.request(|reply| KvSenderCommand::CloseStream { stream_id, reply })
            .await
    }

    pub async fn restart_vbuckets(
        &self,
        stream_id: StreamId,
        restart_ts: TsVbuuid,
    ) -> Result<ResponseHandle, SendError> {
        self.request(|reply| KvSenderCommand::RestartVbuckets {
            stream_id,
            restart_ts,
            reply,
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), SendError> {
        self.send(KvSenderCommand::Shutdown).await
    }
}

#[derive(Debug)]
struct Metrics {
    requests: Metric<U64Counter>,
    attempts: Metric<U64Counter>,
}

impl Metrics {
    fn new(registry: &metric::Registry) -> Self {
        Self {
            requests: registry.register_metric(
                "kv_sender_stream_requests",
                "terminal responses of stream control requests, by outcome",
            ),
            attempts: registry.register_metric(
                "kv_sender_request_attempts",
                "projector fan-out rounds made by stream control requests",
            ),
        }
    }
}

type Clients = Vec<(String, Arc<dyn ProjectorClient>)>;

/// State shared by every request task.
#[derive(Debug)]
struct Inner {
    config: Config,
    topology: Topology,
    projectors: Arc<dyn ProjectorClientFactory>,
    metrics: Metrics,
}

impl Inner {
    fn respond(&self, op: &'static str, reply: Reply, resp: KvSenderResponse) {
        self.metrics
            .requests
            .recorder(&[("operation", op), ("outcome", resp.outcome())])
            .inc(1);
        reply.send(resp);
    }

    fn retry_helper(&self, op: &'static str) -> RetryHelper {
        RetryHelper::new(
            self.config.retry,
            self.metrics.attempts.recorder(&[("operation", op)]),
        )
    }

    fn clients(&self, addrs: Vec<String>) -> Clients {
        addrs
            .into_iter()
            .map(|addr| {
                let client = self.projectors.client(&addr);
                (addr, client)
            })
            .collect()
    }

    async fn open_stream(
        &self,
        op: &'static str,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        restart_ts: Option<TsVbuuid>,
        stop: &CancellationToken,
    ) -> KvSenderResponse {
        let Some(bucket) = index_list.first().map(|i| i.bucket().to_string()) else {
            warn!(%stream_id, "open stream with an empty index list, nothing to do");
            return KvSenderResponse::Success;
        };

        match self
            .try_open_stream(op, stream_id, &bucket, index_list, restart_ts, stop)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                error!(%stream_id, %bucket, error = %e, "open stream failed");
                KvSenderResponse::fatal(e)
            }
        }
    }

    async fn try_open_stream(
        &self,
        op: &'static str,
        stream_id: StreamId,
        bucket: &str,
        index_list: Vec<IndexInst>,
        restart_ts: Option<TsVbuuid>,
        stop: &CancellationToken,
    ) -> Result<KvSenderResponse, StreamRequestError> {
        let instances = self.instance_descriptors(stream_id, index_list).await?;

        // every bucket has the same vbucket set
        let vbnos = self.topology.vbuckets_for_bucket(bucket).await?;

        let restart_ts = match restart_ts {
            Some(ts) => ts.restart_from(&vbnos),
            None => self.initial_restart_ts(bucket, &vbnos, stop).await?,
        };

        let clients = self.clients(self.topology.projector_addrs().await?);

        let mut attempt = OpenStreamAttempt {
            topic: stream_id.topic(),
            bucket,
            vbnos: &vbnos,
            restart_timestamps: vec![restart_ts],
            instances: &instances,
            clients: &clients,
            stop,
            active: None,
            rollback: None,
        };
        let res = self.retry_helper(op).run(&mut attempt, stop).await;

        if let Some(rollback_ts) = attempt.rollback {
            info!(%stream_id, bucket, ?rollback_ts, "rollback received");
            return Ok(KvSenderResponse::Rollback {
                stream_id,
                bucket: bucket.to_string(),
                rollback_ts,
            });
        }
        res?;

        info!(%stream_id, bucket, vbuckets = vbnos.len(), "stream open");
        Ok(KvSenderResponse::Success)
    }

    async fn add_index_list(
        &self,
        op: &'static str,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        stop: &CancellationToken,
    ) -> KvSenderResponse {
        let instances = match self.instance_descriptors(stream_id, index_list).await {
            Ok(v) => v,
            Err(e) => {
                error!(%stream_id, error = %e, "add index list to stream failed");
                return KvSenderResponse::fatal(e);
            }
        };

        self.fan_out(op, stream_id, TopicRequest::AddInstances(&instances), stop)
            .await
    }

    async fn restart_vbuckets(
        &self,
        op: &'static str,
        stream_id: StreamId,
        restart_ts: TsVbuuid,
        stop: &CancellationToken,
    ) -> KvSenderResponse {
        let bucket = restart_ts.bucket().to_string();
        let vbnos = restart_ts.vbnos();

        let num_vbuckets = self.config.num_vbuckets;
        if let Some(vbucket) = vbnos.iter().copied().find(|vb| vb.get() >= num_vbuckets) {
            let e = StreamRequestError::VbucketOutOfRange {
                vbucket,
                num_vbuckets,
            };
            error!(%stream_id, %bucket, error = %e, "restart vbuckets rejected");
            return KvSenderResponse::fatal(e);
        }

        let clients = match self
            .topology
            .projector_addrs_for_vbuckets(&bucket, &vbnos)
            .await
        {
            Ok(addrs) => self.clients(addrs),
            Err(e) => {
                error!(%stream_id, %bucket, error = %e, "restart vbuckets failed");
                return KvSenderResponse::fatal(e.into());
            }
        };

        let mut attempt = RestartAttempt {
            topic: stream_id.topic(),
            bucket: &bucket,
            vbnos: &vbnos,
            restart_timestamps: vec![restart_ts],
            clients: &clients,
            stop,
            rollback: None,
            topic_missing: false,
        };
        let res = self.retry_helper(op).run(&mut attempt, stop).await;

        if let Some(rollback_ts) = attempt.requested_rollback() {
            info!(%stream_id, %bucket, ?rollback_ts, "rollback received");
            return KvSenderResponse::Rollback {
                stream_id,
                bucket,
                rollback_ts,
            };
        }
        if attempt.topic_missing {
            warn!(%stream_id, %bucket, "topic missing on projector, stream needs repair");
            return KvSenderResponse::KvStreamRepair { stream_id, bucket };
        }

        match res {
            Ok(()) => {
                info!(%stream_id, %bucket, vbuckets = vbnos.len(), "vbuckets restarted");
                KvSenderResponse::Success
            }
            Err(e) => {
                error!(%stream_id, %bucket, error = %e, "restart vbuckets failed");
                KvSenderResponse::fatal(e)
            }
        }
    }

    /// Send `request` to every projector in the cluster.
    async fn fan_out(
        &self,
        op: &'static str,
        stream_id: StreamId,
        request: TopicRequest<'_>,
        stop: &CancellationToken,
    ) -> KvSenderResponse {
        let clients = match self.topology.projector_addrs().await {
            Ok(addrs) => self.clients(addrs),
            Err(e) => {
                error!(%stream_id, op, error = %e, "failed to resolve projectors");
                return KvSenderResponse::fatal(e.into());
            }
        };

        let mut attempt = FanOutAttempt {
            topic: stream_id.topic(),
            request,
            clients: &clients,
            stop,
        };
        match self.retry_helper(op).run(&mut attempt, stop).await {
            Ok(()) => {
                info!(%stream_id, op, "request complete");
                KvSenderResponse::Success
            }
            Err(e) => {
                error!(%stream_id, op, error = %e, "request failed");
                KvSenderResponse::fatal(e)
            }
        }
    }

    /// Describe `index_list` for the projectors, routing mutations to this node's endpoint for
    /// `stream_id`.
    async fn instance_descriptors(
        &self,
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
    ) -> Result<Vec<InstanceDescriptor>, StreamRequestError> {
        let endpoint = self
            .topology
            .current_node_service_address(stream_id.endpoint_service())
            .await?;

        Ok(index_list
            .into_iter()
            .map(|inst| InstanceDescriptor {
                inst,
                endpoints: vec![endpoint.clone()],
            })
            .collect())
    }

    /// The starting position of a new stream, from the failover log of the first projector
    /// that serves it.
    async fn initial_restart_ts(
        &self,
        bucket: &str,
        vbnos: &[Vbucket],
        stop: &CancellationToken,
    ) -> Result<TsVbuuid, StreamRequestError> {
        let mut last_err = None;
        for addr in self.topology.projector_addrs().await? {
            if stop.is_cancelled() {
                debug!(bucket, "request stopped, skipping failover log requests");
                return Err(StreamRequestError::Stopped);
            }

            match self
                .projectors
                .client(&addr)
                .get_failover_logs(DEFAULT_POOL, bucket, vbnos)
                .await
            {
                Ok(flog) => {
                    debug!(%addr, bucket, vbuckets = flog.len(), "failover log received");
                    return Ok(TsVbuuid::initial_restart_ts(bucket, &flog));
                }
                Err(e) => {
                    warn!(%addr, bucket, error = %e, "failover log request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| ProjectorError::Unavailable("no projector nodes".to_string()))
            .into())
    }
}

fn contains_any(ts: &TsVbuuid, vbnos: &[Vbucket]) -> bool {
    vbnos.iter().any(|vb| ts.contains(*vb))
}

#[derive(Debug)]
struct OpenStreamAttempt<'a> {
    topic: &'static str,
    bucket: &'a str,
    vbnos: &'a [Vbucket],
    restart_timestamps: Vec<TsVbuuid>,
    instances: &'a [InstanceDescriptor],
    clients: &'a [(String, Arc<dyn ProjectorClient>)],
    stop: &'a CancellationToken,
    /// Accumulated over every attempt.
    active: Option<TsVbuuid>,
    rollback: Option<TsVbuuid>,
}

#[async_trait]
impl<'a> Attempt for OpenStreamAttempt<'a> {
    type Error = StreamRequestError;

    async fn attempt(&mut self, attempt: u32) -> Result<(), StreamRequestError> {
        let mut failed = None;
        for (addr, client) in self.clients {
            if self.stop.is_cancelled() {
                debug!(topic = self.topic, "request stopped, skipping remaining projectors");
                break;
            }

            match client
                .mutation_topic_request(
                    self.topic,
                    DATAPORT_ENDPOINT,
                    &self.restart_timestamps,
                    self.instances,
                )
                .await
            {
                Ok(resp) => {
                    union_for_bucket(&mut self.active, &resp.active_timestamps, self.bucket);
                    union_for_bucket(&mut self.rollback, &resp.rollback_timestamps, self.bucket);
                }
                Err(e) => {
                    error!(
                        %addr,
                        topic = self.topic,
                        attempt,
                        error = %e,
                        "mutation topic request failed"
                    );
                    failed = Some(e);
                }
            }
        }

        // a rollback is final, retrying cannot change it
        if self.rollback.is_some() {
            return Ok(());
        }
        if let Some(e) = failed {
            return Err(e.into());
        }

        let expected = self.vbnos.len();
        let active = self
            .active
            .as_ref()
            .map_or(0, |ts| self.vbnos.iter().filter(|vb| ts.contains(**vb)).count());
        if active < expected {
            return Err(StreamRequestError::PartialShardStart { active, expected });
        }
        Ok(())
    }
}

#[derive(Debug)]
struct RestartAttempt<'a> {
    topic: &'static str,
    bucket: &'a str,
    vbnos: &'a [Vbucket],
    restart_timestamps: Vec<TsVbuuid>,
    clients: &'a [(String, Arc<dyn ProjectorClient>)],
    stop: &'a CancellationToken,
    rollback: Option<TsVbuuid>,
    topic_missing: bool,
}

impl RestartAttempt<'_> {
    /// The rollback timestamp, if it covers any of the restarted vbuckets.
    fn requested_rollback(&mut self) -> Option<TsVbuuid> {
        self.rollback
            .take_if(|ts| contains_any(ts, self.vbnos))
    }
}

#[async_trait]
impl<'a> Attempt for RestartAttempt<'a> {
    type Error = StreamRequestError;

    async fn attempt(&mut self, attempt: u32) -> Result<(), StreamRequestError> {
        let mut failed = None;
        for (addr, client) in self.clients {
            if self.stop.is_cancelled() {
                debug!(topic = self.topic, "request stopped, skipping remaining projectors");
                break;
            }

            // vbuckets that are not running are ignored, so this only has to be attempted
            if let Err(e) = client
                .shutdown_vbuckets(self.topic, &self.restart_timestamps)
                .await
            {
                warn!(
                    %addr,
                    topic = self.topic,
                    error = %e,
                    "shutdown vbuckets failed, restarting anyway"
                );
            }

            match client
                .restart_vbuckets(self.topic, &self.restart_timestamps)
                .await
            {
                Ok(resp) => {
                    union_for_bucket(&mut self.rollback, &resp.rollback_timestamps, self.bucket);
                }
                Err(ProjectorError::TopicMissing) => {
                    error!(%addr, topic = self.topic, attempt, "topic missing on restart");
                    self.topic_missing = true;
                }
                Err(e) => {
                    error!(
                        %addr,
                        topic = self.topic,
                        attempt,
                        error = %e,
                        "restart vbuckets request failed"
                    );
                    failed = Some(e);
                }
            }
        }

        // a rollback or a missing topic is final, retrying cannot change it
        if self
            .rollback
            .as_ref()
            .is_some_and(|ts| contains_any(ts, self.vbnos))
            || self.topic_missing
        {
            return Ok(());
        }
        failed.map_or(Ok(()), |e| Err(e.into()))
    }
}

/// A request sent unchanged to every projector.
#[derive(Debug, Clone, Copy)]
enum TopicRequest<'a> {
    AddInstances(&'a [InstanceDescriptor]),
    DelInstances(&'a [IndexInstId]),
    DelBuckets(&'a [String]),
    ShutdownTopic,
}

impl TopicRequest<'_> {
    /// Removing from a topic that no longer exists has nothing left to do.
    fn topic_missing_is_success(&self) -> bool {
        !matches!(self, Self::AddInstances(_))
    }

    async fn send(&self, client: &dyn ProjectorClient, topic: &str) -> Result<(), ProjectorError> {
        match self {
            Self::AddInstances(instances) => client.add_instances(topic, instances).await,
            Self::DelInstances(inst_ids) => client.del_instances(topic, inst_ids).await,
            Self::DelBuckets(buckets) => client.del_buckets(topic, buckets).await,
            Self::ShutdownTopic => client.shutdown_topic(topic).await,
        }
    }
}

#[derive(Debug)]
struct FanOutAttempt<'a> {
    topic: &'static str,
    request: TopicRequest<'a>,
    clients: &'a [(String, Arc<dyn ProjectorClient>)],
    stop: &'a CancellationToken,
}

#[async_trait]
impl<'a> Attempt for FanOutAttempt<'a> {
    type Error = StreamRequestError;

    async fn attempt(&mut self, attempt: u32) -> Result<(), StreamRequestError> {
        let mut failed = None;
        for (addr, client) in self.clients {
            if self.stop.is_cancelled() {
                debug!(topic = self.topic, "request stopped, skipping remaining projectors");
                break;
            }

            match self.request.send(client.as_ref(), self.topic).await {
                Ok(()) => {}
                Err(ProjectorError::TopicMissing) if self.request.topic_missing_is_success() => {
                    info!(%addr, topic = self.topic, "topic missing, treating as success");
                }
                Err(e) => {
                    error!(
                        %addr,
                        topic = self.topic,
                        attempt,
                        error = %e,
                        "projector request failed"
                    );
                    failed = Some(e);
                }
            }
        }

        failed.map_or(Ok(()), |e| Err(e.into()))
    }
}
