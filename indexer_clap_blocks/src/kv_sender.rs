//! CLI config for the stream control sender.

use std::{num::NonZeroUsize, time::Duration};

use indexer_kv_sender::{Config, RetryConfig};

/// CLI config for the stream control sender.
#[derive(Debug, Clone, Copy, clap::Parser)]
pub struct KvSenderConfig {
    /// Number of vbuckets every bucket is split into.
    #[clap(
        long = "num-vbuckets",
        env = "INDEXER_NUM_VBUCKETS",
        default_value = "1024",
        value_parser = clap::value_parser!(u16).range(1..),
        action
    )]
    pub num_vbuckets: u16,

    /// Attempts made for each projector request before the request is reported as failed.
    #[clap(
        long = "kv-request-max-retries",
        env = "INDEXER_KV_REQUEST_MAX_RETRIES",
        default_value = "3",
        value_parser = clap::value_parser!(u32).range(1..),
        action
    )]
    pub max_retries: u32,

    /// Wait after the first failed attempt. The n-th failure waits n times as long.
    #[clap(
        long = "kv-request-backoff",
        env = "INDEXER_KV_REQUEST_BACKOFF",
        default_value = "1s",
        value_parser = humantime::parse_duration
    )]
    pub backoff: Duration,

    /// Backoff multiplier.
    ///
    /// Accepted for compatibility with existing deployments; backoff grows linearly.
    #[clap(
        long = "kv-request-backoff-factor",
        env = "INDEXER_KV_REQUEST_BACKOFF_FACTOR",
        default_value = "2",
        action
    )]
    pub backoff_factor: u32,

    /// Attempts the cluster info cache makes to refresh itself.
    #[clap(
        long = "cluster-fetch-max-retries",
        env = "INDEXER_CLUSTER_FETCH_MAX_RETRIES",
        default_value = "600",
        action
    )]
    pub cluster_fetch_max_retries: usize,

    /// Number of commands that may wait for dispatch before senders are pushed back on.
    #[clap(
        long = "kv-sender-command-buffer",
        env = "INDEXER_KV_SENDER_COMMAND_BUFFER",
        default_value = "64",
        action
    )]
    pub command_buffer: NonZeroUsize,
}

impl From<KvSenderConfig> for Config {
    fn from(c: KvSenderConfig) -> Self {
        Self {
            num_vbuckets: c.num_vbuckets,
            retry: RetryConfig {
                max_attempts: c.max_retries,
                backoff: c.backoff,
                backoff_factor: c.backoff_factor,
            },
            cluster_fetch_max_retries: c.cluster_fetch_max_retries,
            command_buffer: c.command_buffer.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_match_the_sender() {
        let config = KvSenderConfig::try_parse_from(["my_binary"]).unwrap();
        assert_eq!(Config::from(config), Config::default());
    }

    #[test]
    fn flags() {
        let config = KvSenderConfig::try_parse_from([
            "my_binary",
            "--num-vbuckets",
            "64",
            "--kv-request-max-retries",
            "5",
            "--kv-request-backoff",
            "250ms",
            "--kv-sender-command-buffer",
            "8",
        ])
        .unwrap();

        let config = Config::from(config);
        assert_eq!(config.num_vbuckets, 64);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff, Duration::from_millis(250));
        assert_eq!(config.command_buffer, 8);
        assert_eq!(config.cluster_fetch_max_retries, 600);
    }

    #[test]
    fn rejects_zero() {
        for flag in [
            "--num-vbuckets",
            "--kv-request-max-retries",
            "--kv-sender-command-buffer",
        ] {
            assert!(
                KvSenderConfig::try_parse_from(["my_binary", flag, "0"]).is_err(),
                "{flag} accepted 0"
            );
        }
    }

    #[test]
    fn rejects_bad_duration() {
        assert!(
            KvSenderConfig::try_parse_from(["my_binary", "--kv-request-backoff", "soon"]).is_err()
        );
    }
}
