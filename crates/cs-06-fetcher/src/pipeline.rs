//! # The Fetch Pipeline
//!
//! Fetcher construction, the retry loop, ordered concurrent range commits,
//! the continuous follower, and gap recovery.

use crate::config::{FetcherConfig, CONCURRENT_GAP_THRESHOLD};
use crate::error::FetchError;
use crate::gaps::{group_gaps, GapRange};
use crate::processor::BlockProcessor;
use crate::stats::{FetcherStats, FetcherStatsSnapshot};
use cs_01_node_client::{FeeDelegationSource, NodeClient, PendingTxSource, RpcError};
use cs_03_chain_index::{
    AddressIndexWriter, BalanceWriter, ChainStore, FeeDelegationWriter, LogIndexWriter, WbftWriter,
};
use cs_04_wbft::Candidate;
use cs_05_chain_adapter::ChainAdapter;
use parking_lot::RwLock;
use shared_bus::{ChainEvent, EventBus, TransactionPayload};
use shared_types::{Block, Hash, Receipt};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Builder for [`Fetcher`].
///
/// The client, store, and bus are mandatory; every derived-index writer and
/// client capability is optional and the pipeline degrades without it.
pub struct FetcherBuilder {
    client: Arc<dyn NodeClient>,
    store: ChainStore,
    bus: EventBus,
    config: FetcherConfig,
    adapter: Option<Arc<dyn ChainAdapter>>,
    log_writer: Option<Arc<dyn LogIndexWriter>>,
    addr_writer: Option<Arc<dyn AddressIndexWriter>>,
    balance_writer: Option<Arc<dyn BalanceWriter>>,
    wbft_writer: Option<Arc<dyn WbftWriter>>,
    fee_writer: Option<Arc<dyn FeeDelegationWriter>>,
    fee_source: Option<Arc<dyn FeeDelegationSource>>,
    pending_source: Option<Arc<dyn PendingTxSource>>,
    processors: Vec<Arc<dyn BlockProcessor>>,
    cancel: CancellationToken,
}

impl FetcherBuilder {
    /// Start a builder from the mandatory collaborators.
    #[must_use]
    pub fn new(client: Arc<dyn NodeClient>, store: ChainStore, bus: EventBus) -> Self {
        Self {
            client,
            store,
            bus,
            config: FetcherConfig::default(),
            adapter: None,
            log_writer: None,
            addr_writer: None,
            balance_writer: None,
            wbft_writer: None,
            fee_writer: None,
            fee_source: None,
            pending_source: None,
            processors: Vec::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the pipeline configuration.
    #[must_use]
    pub fn config(mut self, config: FetcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach the chain adapter.
    #[must_use]
    pub fn adapter(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Attach the log-index capability.
    #[must_use]
    pub fn log_index(mut self, writer: Arc<dyn LogIndexWriter>) -> Self {
        self.log_writer = Some(writer);
        self
    }

    /// Attach the address-index capability.
    #[must_use]
    pub fn address_index(mut self, writer: Arc<dyn AddressIndexWriter>) -> Self {
        self.addr_writer = Some(writer);
        self
    }

    /// Attach the balance-tracking capability.
    #[must_use]
    pub fn balances(mut self, writer: Arc<dyn BalanceWriter>) -> Self {
        self.balance_writer = Some(writer);
        self
    }

    /// Attach the consensus-record capability.
    #[must_use]
    pub fn wbft(mut self, writer: Arc<dyn WbftWriter>) -> Self {
        self.wbft_writer = Some(writer);
        self
    }

    /// Attach the fee-delegation storage capability.
    #[must_use]
    pub fn fee_delegation_writer(mut self, writer: Arc<dyn FeeDelegationWriter>) -> Self {
        self.fee_writer = Some(writer);
        self
    }

    /// Attach the fee-delegation client capability.
    #[must_use]
    pub fn fee_delegation_source(mut self, source: Arc<dyn FeeDelegationSource>) -> Self {
        self.fee_source = Some(source);
        self
    }

    /// Attach the pending-tx client capability.
    #[must_use]
    pub fn pending_source(mut self, source: Arc<dyn PendingTxSource>) -> Self {
        self.pending_source = Some(source);
        self
    }

    /// Register an external block processor.
    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn BlockProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> Arc<Fetcher> {
        Arc::new(Fetcher {
            client: self.client,
            store: self.store,
            bus: self.bus,
            config: self.config,
            adapter: self.adapter,
            log_writer: self.log_writer,
            addr_writer: self.addr_writer,
            balance_writer: self.balance_writer,
            wbft_writer: self.wbft_writer,
            fee_writer: self.fee_writer,
            fee_source: self.fee_source,
            pending_source: self.pending_source,
            processors: self.processors,
            cancel: self.cancel,
            stats: Arc::new(FetcherStats::default()),
            candidates: RwLock::new(Vec::new()),
        })
    }
}

/// The fetch pipeline.
pub struct Fetcher {
    pub(crate) client: Arc<dyn NodeClient>,
    pub(crate) store: ChainStore,
    pub(crate) bus: EventBus,
    pub(crate) config: FetcherConfig,
    pub(crate) adapter: Option<Arc<dyn ChainAdapter>>,
    pub(crate) log_writer: Option<Arc<dyn LogIndexWriter>>,
    pub(crate) addr_writer: Option<Arc<dyn AddressIndexWriter>>,
    pub(crate) balance_writer: Option<Arc<dyn BalanceWriter>>,
    pub(crate) wbft_writer: Option<Arc<dyn WbftWriter>>,
    pub(crate) fee_writer: Option<Arc<dyn FeeDelegationWriter>>,
    pub(crate) fee_source: Option<Arc<dyn FeeDelegationSource>>,
    pub(crate) pending_source: Option<Arc<dyn PendingTxSource>>,
    pub(crate) processors: Vec<Arc<dyn BlockProcessor>>,
    pub(crate) cancel: CancellationToken,
    pub(crate) stats: Arc<FetcherStats>,
    /// Candidate list of the current epoch, refreshed at epoch boundaries.
    pub(crate) candidates: RwLock<Vec<Candidate>>,
}

/// Retry an RPC operation with exponential backoff.
///
/// Attempt `n` of `max_retries` waits `retry_delay * 2^(n-1)` before
/// running; cancellation interrupts the wait.
async fn with_retry<T, F, Fut>(
    op: F,
    height: u64,
    max_retries: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
    stats: &FetcherStats,
) -> Result<T, FetchError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut last_err = None;
    for attempt in 1..=max_retries.max(1) {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if attempt > 1 {
            let delay = retry_delay * 2u32.saturating_pow(attempt - 2);
            tokio::select! {
                () = cancel.cancelled() => return Err(FetchError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
            stats.fetch_retries.fetch_add(1, Ordering::Relaxed);
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                debug!(height, attempt, error = %err, "Fetch attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(FetchError::Fetch {
        height,
        attempts: max_retries.max(1),
        source: last_err.unwrap_or(RpcError::Timeout),
    })
}

/// Fetch a block and its receipts, each with its own retry loop.
async fn fetch_block_data(
    client: &dyn NodeClient,
    height: u64,
    max_retries: u32,
    retry_delay: Duration,
    cancel: &CancellationToken,
    stats: &FetcherStats,
) -> Result<(Block, Vec<Receipt>), FetchError> {
    let block = with_retry(
        || client.block_by_number(height),
        height,
        max_retries,
        retry_delay,
        cancel,
        stats,
    )
    .await?;

    let receipts = with_retry(
        || client.block_receipts(height),
        height,
        max_retries,
        retry_delay,
        cancel,
        stats,
    )
    .await?;

    Ok((block, receipts))
}

impl Fetcher {
    /// Snapshot the pipeline counters.
    #[must_use]
    pub fn stats(&self) -> FetcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// The cancellation token governing this pipeline.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn commit_err(height: u64) -> impl FnOnce(cs_03_chain_index::IndexError) -> FetchError {
        move |source| FetchError::Commit { height, source }
    }

    async fn sleep_or_cancel(&self, duration: Duration) -> Result<(), FetchError> {
        tokio::select! {
            () = self.cancel.cancelled() => Err(FetchError::Cancelled),
            () = tokio::time::sleep(duration) => Ok(()),
        }
    }

    /// Fetch and commit a single block.
    pub async fn fetch_block(&self, height: u64) -> Result<(), FetchError> {
        let (block, receipts) = fetch_block_data(
            &*self.client,
            height,
            self.config.max_retries,
            self.config.retry_delay,
            &self.cancel,
            &self.stats,
        )
        .await?;
        self.commit_block(&block, &receipts).await
    }

    /// Fetch and commit an inclusive range sequentially.
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<(), FetchError> {
        for height in start..=end {
            self.fetch_block(height)
                .await
                .map_err(|e| FetchError::range(start, end, e))?;
        }
        Ok(())
    }

    /// Fetch an inclusive range with a worker pool, committing in strictly
    /// ascending height order.
    ///
    /// Workers fetch block + receipts concurrently; a collector buffers
    /// out-of-order results and commits `start, start+1, …` as each next
    /// height becomes available. Any commit-side or unrecoverable
    /// fetch-side error aborts the whole range.
    pub async fn fetch_range_concurrent(&self, start: u64, end: u64) -> Result<(), FetchError> {
        if start > end {
            return Ok(());
        }

        let worker_count = (u64::from(self.config.effective_workers()))
            .min(end - start + 1)
            .max(1) as usize;

        let next_height = Arc::new(AtomicU64::new(start));
        let (result_tx, mut result_rx) =
            mpsc::channel::<(u64, Result<(Block, Vec<Receipt>), FetchError>)>(worker_count * 2);

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let client = Arc::clone(&self.client);
            let cancel = self.cancel.clone();
            let stats = Arc::clone(&self.stats);
            let next = Arc::clone(&next_height);
            let tx = result_tx.clone();
            let max_retries = self.config.max_retries;
            let retry_delay = self.config.retry_delay;

            workers.push(tokio::spawn(async move {
                loop {
                    let height = next.fetch_add(1, Ordering::SeqCst);
                    if height > end {
                        break;
                    }
                    let result = fetch_block_data(
                        &*client,
                        height,
                        max_retries,
                        retry_delay,
                        &cancel,
                        &stats,
                    )
                    .await;
                    let failed = result.is_err();
                    if tx.send((height, result)).await.is_err() || failed {
                        break;
                    }
                }
            }));
        }
        drop(result_tx);

        let mut buffered: HashMap<u64, (Block, Vec<Receipt>)> = HashMap::new();
        let mut next_commit = start;
        let mut failure: Option<FetchError> = None;

        'collect: while let Some((height, result)) = result_rx.recv().await {
            match result {
                Ok(data) => {
                    buffered.insert(height, data);
                }
                Err(err) => {
                    failure = Some(err);
                    break 'collect;
                }
            }

            while let Some((block, receipts)) = buffered.remove(&next_commit) {
                if let Err(err) = self.commit_block(&block, &receipts).await {
                    failure = Some(err);
                    break 'collect;
                }
                next_commit += 1;
            }
        }

        // Closing the receiver makes remaining worker sends fail fast.
        result_rx.close();
        drop(result_rx);
        for worker in workers {
            let _ = worker.await;
        }

        if let Some(err) = failure {
            return Err(FetchError::range(start, end, err));
        }
        if next_commit <= end {
            return Err(FetchError::range(start, end, FetchError::Cancelled));
        }
        Ok(())
    }

    /// Continuous follower: catch up to the node's tip, then poll.
    pub async fn run(&self) -> Result<(), FetchError> {
        info!(start_height = self.config.start_height, "Fetcher running");
        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let tip = match self.client.latest_block_number().await {
                Ok(tip) => tip,
                Err(err) => {
                    warn!(error = %err, "Failed to read chain tip");
                    self.sleep_or_cancel(self.config.poll_interval).await?;
                    continue;
                }
            };

            let next = match self
                .store
                .latest_height()
                .map_err(Self::commit_err(0))?
            {
                Some(latest) => (latest + 1).max(self.config.start_height),
                None => self.config.start_height,
            };

            if next > tip {
                self.sleep_or_cancel(self.config.poll_interval).await?;
                continue;
            }

            let end = tip.min(next + self.config.batch_size.max(1) - 1);
            self.fetch_range_concurrent(next, end).await?;
        }
    }

    /// Scan for block and receipt gaps below the latest indexed height,
    /// fill them, then run the continuous follower.
    pub async fn run_with_gap_recovery(&self) -> Result<(), FetchError> {
        if let Some(latest) = self
            .store
            .latest_height()
            .map_err(Self::commit_err(0))?
        {
            if latest >= self.config.start_height {
                let gaps = self.detect_gaps(self.config.start_height, latest)?;
                if !gaps.is_empty() {
                    info!(count = gaps.len(), "Filling block gaps");
                    self.fill_gaps(&gaps).await?;
                }

                let receipt_gaps = self.detect_receipt_gaps(self.config.start_height, latest)?;
                if !receipt_gaps.is_empty() {
                    info!(count = receipt_gaps.len(), "Filling receipt gaps");
                    self.fill_receipt_gaps(&receipt_gaps).await?;
                }
            }
        }
        self.run().await
    }

    /// Group missing heights in `[start, end]` into ranges.
    pub fn detect_gaps(&self, start: u64, end: u64) -> Result<Vec<GapRange>, FetchError> {
        group_gaps(start, end, |height| {
            self.store
                .has_block(height)
                .map_err(Self::commit_err(height))
        })
    }

    /// Fill gaps, concurrently for large ones.
    pub async fn fill_gaps(&self, gaps: &[GapRange]) -> Result<(), FetchError> {
        for gap in gaps {
            debug!(start = gap.start, end = gap.end, "Filling gap");
            if gap.size() > CONCURRENT_GAP_THRESHOLD {
                self.fetch_range_concurrent(gap.start, gap.end).await?;
            } else {
                self.fetch_range(gap.start, gap.end).await?;
            }
            self.stats.gaps_filled.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Blocks in `[start, end]` with missing receipts.
    pub fn detect_receipt_gaps(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<(u64, Vec<Hash>)>, FetchError> {
        let mut gaps = Vec::new();
        for height in start..=end {
            let Some(block) = self.store.block(height).map_err(Self::commit_err(height))? else {
                continue;
            };
            let missing = self
                .store
                .missing_receipts(&block)
                .map_err(Self::commit_err(height))?;
            if !missing.is_empty() {
                gaps.push((height, missing));
            }
        }
        Ok(gaps)
    }

    /// Re-fetch receipts for gapped blocks and write only the missing
    /// subset. Hashes the node no longer returns are logged and skipped.
    pub async fn fill_receipt_gaps(&self, gaps: &[(u64, Vec<Hash>)]) -> Result<(), FetchError> {
        for (height, missing) in gaps {
            let height = *height;
            let receipts = with_retry(
                || self.client.block_receipts(height),
                height,
                self.config.max_retries,
                self.config.retry_delay,
                &self.cancel,
                &self.stats,
            )
            .await?;

            let by_hash: HashMap<Hash, &Receipt> =
                receipts.iter().map(|r| (r.tx_hash, r)).collect();

            for tx_hash in missing {
                let Some(receipt) = by_hash.get(tx_hash) else {
                    warn!(height, tx_hash = %tx_hash, "Receipt absent from node, skipping");
                    continue;
                };
                self.store
                    .set_receipt(receipt)
                    .map_err(Self::commit_err(height))?;
                self.stats.receipts_stored.fetch_add(1, Ordering::Relaxed);
                self.index_receipt_logs(receipt);
            }
        }
        Ok(())
    }

    /// Subscribe to pending transaction hashes when the client supports it.
    ///
    /// Each hash is resolved and published as a transaction event with zero
    /// block number and hash. Returns `None` when the capability is absent.
    pub fn start_pending_tx_subscription(
        self: &Arc<Self>,
    ) -> Option<tokio::task::JoinHandle<()>> {
        let source = self.pending_source.as_ref()?;
        let mut hashes = source.subscribe_pending_txs();
        let fetcher = Arc::clone(self);

        Some(tokio::spawn(async move {
            info!("Pending transaction subscription started");
            loop {
                tokio::select! {
                    () = fetcher.cancel.cancelled() => break,
                    maybe = hashes.recv() => {
                        let Some(hash) = maybe else { break };
                        match fetcher.client.transaction_by_hash(hash).await {
                            Ok(tx) => {
                                let payload = TransactionPayload {
                                    tx_hash: tx.hash,
                                    block_number: 0,
                                    block_hash: Hash::zero(),
                                    from: tx.from,
                                    to: tx.to,
                                    value: tx.value,
                                    status: None,
                                    contract_address: None,
                                };
                                let accepted =
                                    fetcher.bus.publish(&ChainEvent::Transaction(payload));
                                fetcher.stats.record_publish(accepted);
                            }
                            Err(err) => {
                                debug!(tx_hash = %hash, error = %err, "Pending tx resolution failed");
                            }
                        }
                    }
                }
            }
        }))
    }

    /// Commit one fetched block in the canonical order.
    pub(crate) async fn commit_block(
        &self,
        block: &Block,
        receipts: &[Receipt],
    ) -> Result<(), FetchError> {
        let height = block.number;

        self.store
            .set_block(block)
            .map_err(Self::commit_err(height))?;

        self.metadata_pass(block, receipts).await?;
        self.fee_delegation_pass(block).await;
        self.publish_block_event(block);

        let system_events = self.receipt_pass(block, receipts).await?;
        self.publish_derived_events(block, receipts, &system_events);

        for processor in &self.processors {
            if let Err(err) = processor.process(block, receipts) {
                warn!(
                    processor = processor.name(),
                    height,
                    error = %err,
                    "Block processor failed"
                );
            }
        }

        let current = self
            .store
            .latest_height()
            .map_err(Self::commit_err(height))?;
        if current.map_or(true, |latest| height > latest) {
            self.store
                .set_latest_height(height)
                .map_err(Self::commit_err(height))?;
        }

        self.stats.blocks_indexed.fetch_add(1, Ordering::Relaxed);
        debug!(height, txs = block.transactions.len(), "Block committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cs_02_kv_store::MemoryStore;
    use cs_03_chain_index::ChainIndex;
    use ethereum_types::U256;
    use shared_bus::{EventFilter, EventKind};
    use shared_types::{Address, Transaction};
    use std::sync::atomic::AtomicU32;

    /// In-memory node serving a deterministic chain, with scriptable
    /// failures for the retry tests.
    struct MockNode {
        tip: u64,
        txs_per_block: usize,
        fail_first: AtomicU32,
    }

    impl MockNode {
        fn new(tip: u64, txs_per_block: usize) -> Self {
            Self {
                tip,
                txs_per_block,
                fail_first: AtomicU32::new(0),
            }
        }

        fn failing_first(tip: u64, txs_per_block: usize, failures: u32) -> Self {
            Self {
                tip,
                txs_per_block,
                fail_first: AtomicU32::new(failures),
            }
        }

        fn tx_hash(height: u64, index: usize) -> Hash {
            let mut bytes = [0u8; 32];
            bytes[..8].copy_from_slice(&height.to_be_bytes());
            bytes[8..16].copy_from_slice(&(index as u64).to_be_bytes());
            bytes[31] = 0x77;
            Hash::from(bytes)
        }

        fn make_block(&self, height: u64) -> Block {
            Block {
                number: height,
                hash: Hash::from_low_u64_be(height + 1),
                parent_hash: Hash::from_low_u64_be(height),
                miner: Address::repeat_byte(0xee),
                gas_used: 21_000 * self.txs_per_block as u64,
                gas_limit: 30_000_000,
                timestamp: 1_700_000_000 + height,
                extra_data: Vec::new(),
                transactions: (0..self.txs_per_block)
                    .map(|i| Transaction {
                        hash: Self::tx_hash(height, i),
                        from: Address::repeat_byte(0x01),
                        to: Some(Address::repeat_byte(0x02)),
                        value: U256::from(100u64),
                        gas: 21_000,
                        gas_price: U256::from(1u64),
                        nonce: height,
                        index: i as u32,
                        ..Transaction::default()
                    })
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl NodeClient for MockNode {
        async fn latest_block_number(&self) -> Result<u64, RpcError> {
            Ok(self.tip)
        }

        async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
            if self
                .fail_first
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(RpcError::Transport("injected".into()));
            }
            if number > self.tip {
                return Err(RpcError::NotFound(format!("block {number}")));
            }
            Ok(self.make_block(number))
        }

        async fn block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RpcError> {
            if number > self.tip {
                return Err(RpcError::NotFound(format!("receipts {number}")));
            }
            Ok((0..self.txs_per_block)
                .map(|i| Receipt {
                    tx_hash: Self::tx_hash(number, i),
                    block_number: number,
                    status: true,
                    gas_used: 21_000,
                    cumulative_gas_used: 21_000 * (i as u64 + 1),
                    ..Receipt::default()
                })
                .collect())
        }

        async fn transaction_by_hash(&self, hash: Hash) -> Result<Transaction, RpcError> {
            Err(RpcError::NotFound(format!("tx {hash:?}")))
        }

        async fn balance_at(&self, _address: Address, _height: u64) -> Result<U256, RpcError> {
            Ok(U256::from(1_000_000u64))
        }

        async fn chain_id(&self) -> Result<u64, RpcError> {
            Ok(1111)
        }

        async fn client_version(&self) -> Result<String, RpcError> {
            Ok("MockNode/v0.1".into())
        }
    }

    fn build_fetcher(node: MockNode) -> (Arc<Fetcher>, EventBus) {
        let kv = Arc::new(MemoryStore::new());
        let store = ChainStore::new(kv.clone());
        let index = Arc::new(ChainIndex::new(kv));
        let bus = EventBus::new();
        let fetcher = FetcherBuilder::new(Arc::new(node), store, bus.clone())
            .config(FetcherConfig::for_testing())
            .log_index(index.clone())
            .address_index(index.clone())
            .balances(index)
            .build();
        (fetcher, bus)
    }

    #[tokio::test]
    async fn test_fetch_block_commits_and_marks_latest() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(9, 2));

        fetcher.fetch_block(4).await.unwrap();
        assert!(fetcher.store.has_block(4).unwrap());
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(4));
        assert_eq!(fetcher.stats().blocks_indexed, 1);
        assert_eq!(fetcher.stats().receipts_stored, 2);
    }

    #[tokio::test]
    async fn test_fetch_range_sequential() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(9, 1));

        fetcher.fetch_range(0, 9).await.unwrap();
        for height in 0..=9 {
            assert!(fetcher.store.has_block(height).unwrap());
        }
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(9));
        assert!(fetcher.detect_gaps(0, 9).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_range_matches_sequential() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(99, 2));

        fetcher.fetch_range_concurrent(0, 99).await.unwrap();
        for height in 0..=99 {
            assert!(fetcher.store.has_block(height).unwrap());
            let block = fetcher.store.block(height).unwrap().unwrap();
            assert!(fetcher.store.missing_receipts(&block).unwrap().is_empty());
        }
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(99));
    }

    #[tokio::test]
    async fn test_block_events_precede_tx_events() {
        let (fetcher, bus) = build_fetcher(MockNode::new(2, 1));
        let mut sub = bus.subscribe(
            "probe",
            [EventKind::Block, EventKind::Transaction],
            EventFilter::all(),
            64,
        );

        fetcher.fetch_block(1).await.unwrap();

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert!(matches!(first, ChainEvent::Block(_)));
        assert!(matches!(second, ChainEvent::Transaction(_)));
    }

    #[tokio::test]
    async fn test_retry_then_succeed() {
        let (fetcher, _bus) = build_fetcher(MockNode::failing_first(5, 1, 2));

        fetcher.fetch_block(3).await.unwrap();
        assert!(fetcher.store.has_block(3).unwrap());
        assert!(fetcher.stats().fetch_retries >= 2);
    }

    #[tokio::test]
    async fn test_retries_exhausted_propagates() {
        let (fetcher, _bus) = build_fetcher(MockNode::failing_first(5, 1, 100));

        let err = fetcher.fetch_block(3).await.unwrap_err();
        assert!(matches!(err, FetchError::Fetch { height: 3, .. }));
        assert!(!fetcher.store.has_block(3).unwrap());
        assert_eq!(fetcher.store.latest_height().unwrap(), None);
    }

    #[tokio::test]
    async fn test_gap_detection_and_fill() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(10, 1));

        for height in [0u64, 1, 2, 5, 6, 9, 10] {
            fetcher.fetch_block(height).await.unwrap();
        }
        let gaps = fetcher.detect_gaps(0, 10).unwrap();
        assert_eq!(
            gaps,
            vec![GapRange { start: 3, end: 4 }, GapRange { start: 7, end: 8 }]
        );

        fetcher.fill_gaps(&gaps).await.unwrap();
        assert!(fetcher.detect_gaps(0, 10).unwrap().is_empty());
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_receipt_gap_detection_and_fill() {
        let node = MockNode::new(5, 2);
        let block3 = node.make_block(3);
        let (fetcher, _bus) = build_fetcher(node);

        // A block stored without its receipts is a receipt gap.
        fetcher.store.set_block(&block3).unwrap();
        fetcher.store.set_latest_height(3).unwrap();

        let gaps = fetcher.detect_receipt_gaps(0, 5).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].0, 3);
        assert_eq!(gaps[0].1.len(), 2);

        fetcher.fill_receipt_gaps(&gaps).await.unwrap();
        assert!(fetcher.detect_receipt_gaps(0, 5).unwrap().is_empty());
        assert!(fetcher.store.has_receipt(&block3.transactions[0].hash).unwrap());
    }

    #[tokio::test]
    async fn test_latest_height_monotone_during_gap_fill() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(10, 1));

        fetcher.fetch_block(10).await.unwrap();
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(10));

        fetcher.fetch_range(3, 4).await.unwrap();
        // Filling older heights must not move the marker backwards.
        assert_eq!(fetcher.store.latest_height().unwrap(), Some(10));
    }

    #[tokio::test]
    async fn test_cancelled_fetch_returns_cancelled() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(10, 1));
        fetcher.cancel_token().cancel();

        let err = fetcher.fetch_block(1).await.unwrap_err();
        assert!(matches!(err, FetchError::Cancelled));
    }

    #[tokio::test]
    async fn test_genesis_bootstrap_seeds_miner() {
        let (fetcher, _bus) = build_fetcher(MockNode::new(3, 1));

        fetcher.fetch_block(0).await.unwrap();

        // The miner was seeded from balance_at(0).
        let balances = fetcher.balance_writer.as_ref().unwrap();
        assert!(balances.has_balance(&Address::repeat_byte(0xee)).unwrap());
        assert_eq!(
            balances.balance(&Address::repeat_byte(0xee)).unwrap(),
            U256::from(1_000_000u64)
        );
    }
}
