//! Bounded retries of a fan-out attempt.

use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use metric::U64Counter;
use observability_deps::tracing::warn;
use tokio_util::sync::CancellationToken;

/// Number of attempts made for every projector request.
pub const MAX_KV_REQUEST_RETRY: u32 = 3;

/// Backoff after the first failed attempt.
pub const KV_REQUEST_BACKOFF: Duration = Duration::from_secs(1);

pub const BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// The wait after the n-th failed attempt is `backoff * n`.
    pub backoff: Duration,

    /// Carried for configuration compatibility; the wait grows linearly regardless.
    pub backoff_factor: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_KV_REQUEST_RETRY,
            backoff: KV_REQUEST_BACKOFF,
            backoff_factor: BACKOFF_FACTOR,
        }
    }
}

/// One round of a retried operation.
#[async_trait]
pub(crate) trait Attempt: Send {
    type Error: Display + Send;

    /// Perform attempt number `attempt` (starting at 0).
    async fn attempt(&mut self, attempt: u32) -> Result<(), Self::Error>;
}

/// Drives an [`Attempt`] until it succeeds, runs out of attempts, or is stopped.
#[derive(Debug)]
pub(crate) struct RetryHelper {
    config: RetryConfig,
    attempts: U64Counter,
}

impl RetryHelper {
    pub(crate) fn new(config: RetryConfig, attempts: U64Counter) -> Self {
        Self { config, attempts }
    }

    /// Run `op`, returning the error of the last attempt if none succeeded.
    ///
    /// Once `stop` is cancelled no further attempts are started.
    pub(crate) async fn run<A: Attempt>(
        &self,
        op: &mut A,
        stop: &CancellationToken,
    ) -> Result<(), A::Error> {
        let mut attempt = 0;
        loop {
            self.attempts.inc(1);
            let err = match op.attempt(attempt).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            attempt += 1;
            if attempt >= self.config.max_attempts || stop.is_cancelled() {
                return Err(err);
            }

            let backoff = self.config.backoff * attempt;
            warn!(
                error = %err,
                attempt,
                max_attempts = self.config.max_attempts,
                ?backoff,
                "request attempt failed, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}
