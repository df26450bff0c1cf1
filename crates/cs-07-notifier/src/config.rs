//! # Notifier Configuration

use crate::error::NotifyError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Notification service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Delivery worker count.
    pub workers: usize,

    /// Bounded work-queue capacity.
    pub queue_size: usize,

    /// Delivery attempts before a notification fails terminally.
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,

    /// Upper bound on the computed retry delay.
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,

    /// Backoff multiplier: attempt `n` waits `initial * multiplier^(n-1)`.
    pub multiplier: f64,

    /// Retry-poller interval.
    #[serde(with = "duration_millis")]
    pub flush_interval: Duration,

    /// Cleanup-poller interval.
    #[serde(with = "duration_millis")]
    pub cleanup_interval: Duration,

    /// Delivery-history retention window.
    #[serde(with = "duration_millis")]
    pub history_retention: Duration,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_size: 1024,
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
            flush_interval: Duration::from_secs(5),
            cleanup_interval: Duration::from_secs(3600),
            history_retention: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

impl NotifierConfig {
    /// Config for tests: tight timings.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            workers: 2,
            queue_size: 64,
            max_attempts: 5,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
            multiplier: 2.0,
            flush_interval: Duration::from_millis(25),
            cleanup_interval: Duration::from_secs(3600),
            history_retention: Duration::from_secs(3600),
        }
    }

    /// Surface configuration mistakes at start.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.workers == 0 {
            return Err(NotifyError::InvalidConfig("workers must be > 0".into()));
        }
        if self.queue_size == 0 {
            return Err(NotifyError::InvalidConfig("queue_size must be > 0".into()));
        }
        if self.max_attempts == 0 {
            return Err(NotifyError::InvalidConfig("max_attempts must be > 0".into()));
        }
        if self.multiplier < 1.0 {
            return Err(NotifyError::InvalidConfig(
                "multiplier must be >= 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Backoff delay for the given attempt number (1-based), capped.
    #[must_use]
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = self.initial_delay.mul_f64(factor);
        delay.min(self.max_delay)
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
