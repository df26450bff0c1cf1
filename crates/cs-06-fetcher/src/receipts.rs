//! # Receipt Pass
//!
//! Receipt writes plus log indexing, routed through a parallel helper when
//! the block trips the large-block predicate. System-contract parsing runs
//! on every log either way; its failures (and log-index failures) are
//! logged and skipped, while receipt write failures abort the commit.

use crate::error::FetchError;
use crate::pipeline::Fetcher;
use cs_03_chain_index::{ChainStore, IndexError, LogIndexWriter};
use cs_04_wbft::SystemEvent;
use shared_types::{Block, Receipt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// Parallel chunks used by the large-block helper.
const LARGE_BLOCK_CHUNKS: usize = 8;

fn write_one(
    store: &ChainStore,
    log_writer: Option<&Arc<dyn LogIndexWriter>>,
    receipt: &Receipt,
) -> Result<(), IndexError> {
    store.set_receipt(receipt)?;
    if let Some(writer) = log_writer {
        for log in &receipt.logs {
            if let Err(err) = writer.index_log(log) {
                warn!(
                    block = receipt.block_number,
                    tx_hash = %receipt.tx_hash,
                    error = %err,
                    "Log index write failed, skipping"
                );
            }
        }
    }
    Ok(())
}

impl Fetcher {
    /// True when the block routes to the parallel receipt helper.
    ///
    /// Strictly above either threshold; at the boundary the sequential
    /// path runs.
    pub(crate) fn is_large_block(&self, block: &Block, receipts: &[Receipt]) -> bool {
        block.gas_used > self.config.large_block_gas
            || receipts.len() > self.config.large_block_receipts
    }

    /// Index one backfilled receipt's logs (used by receipt-gap fill).
    pub(crate) fn index_receipt_logs(&self, receipt: &Receipt) {
        if let Some(writer) = &self.log_writer {
            for log in &receipt.logs {
                if let Err(err) = writer.index_log(log) {
                    warn!(
                        block = receipt.block_number,
                        error = %err,
                        "Log index write failed, skipping"
                    );
                }
            }
        }
    }

    /// Write receipts and index their logs, then parse system-contract
    /// events from every log. Returns the decoded system events.
    pub(crate) async fn receipt_pass(
        &self,
        block: &Block,
        receipts: &[Receipt],
    ) -> Result<Vec<SystemEvent>, FetchError> {
        let height = block.number;

        if self.is_large_block(block, receipts) {
            self.write_receipts_parallel(height, receipts).await?;
        } else {
            for receipt in receipts {
                write_one(&self.store, self.log_writer.as_ref(), receipt)
                    .map_err(|source| FetchError::Commit { height, source })?;
            }
        }
        self.stats
            .receipts_stored
            .fetch_add(receipts.len() as u64, Ordering::Relaxed);

        Ok(self.parse_system_events(receipts))
    }

    /// Large-block helper: receipts written and logs indexed in parallel.
    async fn write_receipts_parallel(
        &self,
        height: u64,
        receipts: &[Receipt],
    ) -> Result<(), FetchError> {
        let chunk_size = receipts.len().div_ceil(LARGE_BLOCK_CHUNKS).max(1);
        let mut tasks = Vec::new();

        for chunk in receipts.chunks(chunk_size) {
            let store = self.store.clone();
            let log_writer = self.log_writer.clone();
            let chunk = chunk.to_vec();
            tasks.push(tokio::spawn(async move {
                for receipt in &chunk {
                    write_one(&store, log_writer.as_ref(), receipt)?;
                }
                Ok::<(), IndexError>(())
            }));
        }

        for task in tasks {
            let joined = task.await.map_err(|err| FetchError::Commit {
                height,
                source: IndexError::Codec(format!("receipt task panicked: {err}")),
            })?;
            joined.map_err(|source| FetchError::Commit { height, source })?;
        }
        Ok(())
    }

    fn parse_system_events(&self, receipts: &[Receipt]) -> Vec<SystemEvent> {
        let Some(decoder) = self
            .adapter
            .as_ref()
            .and_then(|adapter| adapter.system_contracts())
        else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for receipt in receipts {
            for log in &receipt.logs {
                if let Some(event) = decoder.decode_system_log(log) {
                    events.push(event);
                }
            }
        }
        events
    }
}
