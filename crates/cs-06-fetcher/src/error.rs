//! # Pipeline Errors

use cs_01_node_client::RpcError;
use cs_03_chain_index::IndexError;
use thiserror::Error;

/// Errors from fetch-pipeline operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Block or receipt fetch exhausted its retries.
    #[error("Fetch failed for block {height} after {attempts} attempts: {source}")]
    Fetch {
        /// The height being fetched.
        height: u64,
        /// Attempts made.
        attempts: u32,
        /// The final attempt's error.
        #[source]
        source: RpcError,
    },

    /// A storage write aborted the block's commit.
    ///
    /// The height is not marked latest; re-indexing the height is safe.
    #[error("Commit failed for block {height}: {source}")]
    Commit {
        /// The height being committed.
        height: u64,
        /// The failing write.
        #[source]
        source: IndexError,
    },

    /// A range operation aborted because a worker or the collector failed.
    #[error("Range [{start}, {end}] aborted: {source}")]
    RangeAborted {
        /// Range start.
        start: u64,
        /// Range end.
        end: u64,
        /// The underlying failure.
        #[source]
        source: Box<FetchError>,
    },

    /// The operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

impl FetchError {
    /// Wrap an error as a range abort.
    #[must_use]
    pub fn range(start: u64, end: u64, source: FetchError) -> Self {
        Self::RangeAborted {
            start,
            end,
            source: Box::new(source),
        }
    }
}
