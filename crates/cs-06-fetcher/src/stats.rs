//! # Pipeline Counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters maintained by the pipeline.
#[derive(Debug, Default)]
pub struct FetcherStats {
    pub(crate) blocks_indexed: AtomicU64,
    pub(crate) receipts_stored: AtomicU64,
    pub(crate) events_published: AtomicU64,
    pub(crate) events_dropped: AtomicU64,
    pub(crate) fetch_retries: AtomicU64,
    pub(crate) gaps_filled: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FetcherStatsSnapshot {
    /// Blocks committed.
    pub blocks_indexed: u64,
    /// Receipts written.
    pub receipts_stored: u64,
    /// Events accepted by the bus.
    pub events_published: u64,
    /// Events the bus reported dropped.
    pub events_dropped: u64,
    /// Fetch attempts beyond the first.
    pub fetch_retries: u64,
    /// Gap ranges filled.
    pub gaps_filled: u64,
}

impl FetcherStats {
    pub(crate) fn record_publish(&self, accepted: bool) {
        if accepted {
            self.events_published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot the counters.
    #[must_use]
    pub fn snapshot(&self) -> FetcherStatsSnapshot {
        FetcherStatsSnapshot {
            blocks_indexed: self.blocks_indexed.load(Ordering::Relaxed),
            receipts_stored: self.receipts_stored.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            fetch_retries: self.fetch_retries.load(Ordering::Relaxed),
            gaps_filled: self.gaps_filled.load(Ordering::Relaxed),
        }
    }
}
