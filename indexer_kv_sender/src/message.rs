//! Commands accepted by the [`KvSender`](crate::KvSender) and the responses it reports.

use indexer_types::{IndexInst, StreamId, TsVbuuid, Vbucket};
use observability_deps::tracing::debug;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::{projector::ProjectorError, topology::TopologyError};

/// A stream control request.
///
/// Every variant but [`KvSenderCommand::Shutdown`] carries a [`Reply`] that receives exactly one
/// terminal [`KvSenderResponse`] once the request has been carried out.
#[derive(Debug)]
pub enum KvSenderCommand {
    /// Start the stream for the bucket of `index_list`, from `restart_ts` if given or from the
    /// start of each vbucket's history otherwise.
    OpenStream {
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        restart_ts: Option<TsVbuuid>,
        reply: Reply,
    },
    AddIndexListToStream {
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        reply: Reply,
    },
    RemoveIndexListFromStream {
        stream_id: StreamId,
        index_list: Vec<IndexInst>,
        reply: Reply,
    },
    RemoveBucketFromStream {
        stream_id: StreamId,
        bucket: String,
        reply: Reply,
    },
    CloseStream {
        stream_id: StreamId,
        reply: Reply,
    },
    /// Restart the vbuckets named in `restart_ts` from the positions it holds.
    RestartVbuckets {
        stream_id: StreamId,
        restart_ts: TsVbuuid,
        reply: Reply,
    },
    /// Stop accepting commands. Requests already dispatched still complete.
    Shutdown,
}

impl KvSenderCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStream { .. } => "open_stream",
            Self::AddIndexListToStream { .. } => "add_index_list_to_stream",
            Self::RemoveIndexListFromStream { .. } => "remove_index_list_from_stream",
            Self::RemoveBucketFromStream { .. } => "remove_bucket_from_stream",
            Self::CloseStream { .. } => "close_stream",
            Self::RestartVbuckets { .. } => "restart_vbuckets",
            Self::Shutdown => "shutdown",
        }
    }
}

/// The sending half of a request's response channel, plus the token its caller cancels to
/// abandon the request early.
#[derive(Debug)]
pub struct Reply {
    respond_to: oneshot::Sender<KvSenderResponse>,
    stop: CancellationToken,
}

impl Reply {
    pub fn channel() -> (Self, ResponseHandle) {
        let (tx, rx) = oneshot::channel();
        let stop = CancellationToken::new();
        (
            Self {
                respond_to: tx,
                stop: stop.clone(),
            },
            ResponseHandle { rx, stop },
        )
    }

    pub(crate) fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    pub(crate) fn send(self, response: KvSenderResponse) {
        if let Err(response) = self.respond_to.send(response) {
            debug!(?response, "response receiver dropped");
        }
    }
}

/// The caller's side of a request: waits for its terminal response.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<KvSenderResponse>,
    stop: CancellationToken,
}

impl ResponseHandle {
    pub async fn wait(self) -> Result<KvSenderResponse, SendError> {
        self.rx.await.map_err(|_| SendError::NoResponse)
    }

    /// Ask the request to stop contacting further projectors.
    ///
    /// Requests already in flight complete, and a response is still sent.
    pub fn cancel(&self) {
        self.stop.cancel();
    }
}

/// The terminal outcome of a request.
#[derive(Debug)]
pub enum KvSenderResponse {
    Success,

    /// A projector cannot serve the requested position; the stream must roll back to
    /// `rollback_ts` before it can proceed.
    Rollback {
        stream_id: StreamId,
        bucket: String,
        rollback_ts: TsVbuuid,
    },

    /// The topic no longer exists on a projector and the stream must be opened again.
    KvStreamRepair { stream_id: StreamId, bucket: String },

    Error(ErrorInfo),
}

impl KvSenderResponse {
    pub(crate) fn fatal(cause: StreamRequestError) -> Self {
        Self::Error(ErrorInfo {
            code: ErrorCode::StreamRequestError,
            severity: Severity::Fatal,
            cause,
        })
    }

    /// Label used for the outcome metric.
    pub(crate) fn outcome(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Rollback { .. } => "rollback",
            Self::KvStreamRepair { .. } => "repair",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    StreamRequestError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
}

#[derive(Debug)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub severity: Severity,
    pub cause: StreamRequestError,
}

#[derive(Debug, Error)]
pub enum StreamRequestError {
    #[error("cluster topology: {0}")]
    Topology(#[from] TopologyError),

    #[error("projector: {0}")]
    Projector(#[from] ProjectorError),

    #[error("only {active} of {expected} vbuckets started")]
    PartialShardStart { active: usize, expected: usize },

    #[error("vbucket {vbucket} out of range for {num_vbuckets} vbuckets")]
    VbucketOutOfRange { vbucket: Vbucket, num_vbuckets: u16 },

    /// The caller cancelled the request before a starting position could be fetched.
    #[error("request stopped before the stream position was known")]
    Stopped,
}

/// Failure to hand a command to the [`KvSender`](crate::KvSender).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("kv sender is not running")]
    Closed,

    #[error("kv sender stopped before acknowledging the command")]
    NoAck,

    #[error("kv sender dropped the request without a response")]
    NoResponse,
}
