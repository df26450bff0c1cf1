//! # Fetch Pipeline (Subsystem 6)
//!
//! The central orchestration of the indexer. For every block height the
//! pipeline fetches the block and its receipts from the node (with
//! exponential-backoff retry), then commits in a fixed order:
//!
//! 1. block record
//! 2. metadata pass: consensus parse, address indexing, balance tracking,
//!    genesis bootstrap at height zero
//! 3. fee-delegation pass (log-and-continue)
//! 4. block event
//! 5. receipt pass: receipt writes, log indexing, system-contract parsing
//! 6. transaction / log / validator-set events
//! 7. external block processors (log-and-continue)
//! 8. the latest-height commit marker — the sole visibility boundary
//!
//! `fetch_range_concurrent` fans fetching out over a worker pool while a
//! collector commits strictly in ascending height order. Gap detection and
//! backfill recover from partial histories at startup.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod config;
pub mod error;
mod events;
pub mod gaps;
mod metadata;
pub mod pipeline;
pub mod processor;
mod receipts;
pub mod stats;

pub use config::FetcherConfig;
pub use error::FetchError;
pub use gaps::GapRange;
pub use pipeline::{Fetcher, FetcherBuilder};
pub use processor::BlockProcessor;
pub use stats::FetcherStatsSnapshot;
