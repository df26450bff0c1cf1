//! # Fetcher Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker count used when the configured value is zero.
pub const DEFAULT_WORKERS: u32 = 100;

/// Gap sizes above this use the concurrent fill path.
pub const CONCURRENT_GAP_THRESHOLD: u64 = 10;

/// Fetch pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// First height this deployment is responsible for.
    pub start_height: u64,

    /// Heights fetched per follower iteration.
    pub batch_size: u64,

    /// Concurrent fetch workers; zero means the default.
    pub workers: u32,

    /// Attempts per block or receipt fetch before giving up.
    pub max_retries: u32,

    /// Base retry delay; attempt `n` waits `retry_delay * 2^(n-1)`.
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,

    /// Tip poll interval once caught up.
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Gas-used threshold of the large-block predicate.
    pub large_block_gas: u64,

    /// Receipt-count threshold of the large-block predicate.
    pub large_block_receipts: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            start_height: 0,
            batch_size: 200,
            workers: 0,
            max_retries: 5,
            retry_delay: Duration::from_millis(500),
            poll_interval: Duration::from_secs(2),
            large_block_gas: 10_000_000,
            large_block_receipts: 200,
        }
    }
}

impl FetcherConfig {
    /// Config for tests: tight timings, small thresholds.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            batch_size: 20,
            workers: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(5),
            poll_interval: Duration::from_millis(20),
            large_block_gas: 1_000_000,
            large_block_receipts: 8,
            ..Self::default()
        }
    }

    /// The effective worker count after resolving the zero default.
    #[must_use]
    pub fn effective_workers(&self) -> u32 {
        if self.workers == 0 {
            DEFAULT_WORKERS
        } else {
            self.workers
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_workers_resolution() {
        let config = FetcherConfig::default();
        assert_eq!(config.workers, 0);
        assert_eq!(config.effective_workers(), DEFAULT_WORKERS);

        let config = FetcherConfig {
            workers: 8,
            ..FetcherConfig::default()
        };
        assert_eq!(config.effective_workers(), 8);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = FetcherConfig::for_testing();
        let json = serde_json::to_string(&config).unwrap();
        let loaded: FetcherConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.retry_delay, config.retry_delay);
        assert_eq!(loaded.workers, config.workers);
    }
}
