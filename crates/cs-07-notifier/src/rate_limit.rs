//! # Minute Token Bucket
//!
//! Per-handler rate limiter: `capacity` tokens per minute, refilled
//! proportionally to the elapsed fraction of a minute and clamped at
//! capacity. An exhausted bucket fails the delivery attempt without any
//! external call; the retry policy picks it up later.

use parking_lot::Mutex;
use std::time::Instant;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled on a per-minute schedule.
pub struct MinuteBucket {
    capacity: f64,
    state: Mutex<BucketState>,
}

impl MinuteBucket {
    /// A bucket holding `per_minute` tokens, starting full.
    #[must_use]
    pub fn new(per_minute: u32) -> Self {
        Self {
            capacity: f64::from(per_minute),
            state: Mutex::new(BucketState {
                tokens: f64::from(per_minute),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Take one token; `false` when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.last_refill = now;

        let refill = elapsed.as_secs_f64() / 60.0 * self.capacity;
        state.tokens = (state.tokens + refill).min(self.capacity);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (rounded down).
    #[must_use]
    pub fn available(&self) -> u32 {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill);
        state.last_refill = now;
        let refill = elapsed.as_secs_f64() / 60.0 * self.capacity;
        state.tokens = (state.tokens + refill).min(self.capacity);
        state.tokens as u32
    }
}
