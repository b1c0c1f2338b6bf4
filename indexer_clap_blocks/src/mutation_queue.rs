//! CLI config for the per-vbucket mutation queue.

use std::time::Duration;

use indexer_buffer::ShardedMutationQueue;

/// CLI config for the per-vbucket mutation queue.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct MutationQueueConfig {
    /// How often an idle consumer polls its vbucket for new mutations.
    ///
    /// Shorter intervals lower delivery latency at the cost of more wakeups.
    #[clap(
        long = "mutation-queue-poll-interval",
        env = "INDEXER_MUTATION_QUEUE_POLL_INTERVAL",
        default_value = "5ms",
        value_parser = humantime::parse_duration
    )]
    pub poll_interval: Duration,
}

impl MutationQueueConfig {
    /// Build a queue holding `num_vbuckets` vbuckets.
    pub fn build(&self, num_vbuckets: u16) -> ShardedMutationQueue {
        ShardedMutationQueue::new(num_vbuckets).with_poll_interval(self.poll_interval)
    }
}

impl From<MutationQueueConfig> for Duration {
    fn from(c: MutationQueueConfig) -> Self {
        c.poll_interval
    }
}
