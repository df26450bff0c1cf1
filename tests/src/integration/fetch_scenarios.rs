//! # Fetch Pipeline Scenarios
//!
//! Sequential and concurrent indexing, gap fill, balance-history sums,
//! consensus records, and the large-block boundary.

#[cfg(test)]
mod tests {
    use crate::local_node::{LocalNode, LocalNodeConfig, BASELINE_BALANCE};
    use cs_02_kv_store::MemoryStore;
    use cs_03_chain_index::{BalanceWriter, ChainIndex, ChainStore, WbftWriter};
    use cs_05_chain_adapter::WbftAdapter;
    use cs_06_fetcher::{Fetcher, FetcherBuilder, FetcherConfig, GapRange};
    use ethereum_types::U256;
    use shared_bus::{ChainEvent, EventBus, EventFilter, EventKind};
    use shared_types::Address;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        node: Arc<LocalNode>,
        fetcher: Arc<Fetcher>,
        store: ChainStore,
        index: Arc<ChainIndex>,
        bus: EventBus,
    }

    fn harness_with(node: LocalNode, config: FetcherConfig, wbft: bool) -> Harness {
        let node = Arc::new(node);
        let kv = Arc::new(MemoryStore::new());
        let store = ChainStore::new(kv.clone());
        let index = Arc::new(ChainIndex::new(kv));
        let bus = EventBus::new();

        let mut builder = FetcherBuilder::new(node.clone(), store.clone(), bus.clone())
            .config(config)
            .log_index(index.clone())
            .address_index(index.clone())
            .balances(index.clone())
            .wbft(index.clone());
        if wbft {
            builder = builder.adapter(Arc::new(WbftAdapter::new("wemix", 1111)));
        }

        Harness {
            node,
            fetcher: builder.build(),
            store,
            index,
            bus,
        }
    }

    fn harness(tip: u64, txs_per_block: usize) -> Harness {
        harness_with(
            LocalNode::new(tip, txs_per_block),
            FetcherConfig::for_testing(),
            false,
        )
    }

    // Scenario: sequential index of ten blocks on an empty store.
    #[tokio::test]
    async fn test_sequential_index_of_ten_blocks() {
        let h = harness(9, 2);

        h.fetcher.fetch_range(0, 9).await.unwrap();

        for height in 0..=9 {
            assert!(h.store.has_block(height).unwrap(), "missing block {height}");
        }
        assert_eq!(h.store.latest_height().unwrap(), Some(9));
        assert!(h.fetcher.detect_gaps(0, 9).unwrap().is_empty());
    }

    // Scenario: concurrent index of one hundred blocks with monotone
    // latest-height and the full receipt set.
    #[tokio::test]
    async fn test_concurrent_index_hundred_blocks() {
        let h = harness_with(
            LocalNode::new(99, 2),
            FetcherConfig {
                workers: 5,
                ..FetcherConfig::for_testing()
            },
            false,
        );

        // Sample latest-height while the range runs.
        let sampler_store = h.store.clone();
        let sampler = tokio::spawn(async move {
            let mut samples = Vec::new();
            for _ in 0..500 {
                if let Ok(Some(height)) = sampler_store.latest_height() {
                    samples.push(height);
                }
                tokio::time::sleep(Duration::from_micros(200)).await;
            }
            samples
        });

        h.fetcher.fetch_range_concurrent(0, 99).await.unwrap();
        let samples = sampler.await.unwrap();

        assert!(
            samples.windows(2).all(|w| w[0] <= w[1]),
            "latest height regressed: {samples:?}"
        );
        assert_eq!(h.store.latest_height().unwrap(), Some(99));

        // Stored receipts equal the union of the node's receipts.
        for height in 0..=99 {
            for receipt in h.node.receipts_at(height) {
                assert!(
                    h.store.has_receipt(&receipt.tx_hash).unwrap(),
                    "missing receipt at {height}"
                );
            }
        }
    }

    // Scenario: gap fill over a pre-seeded store with holes.
    #[tokio::test]
    async fn test_gap_fill() {
        let h = harness(10, 1);

        for height in [0u64, 1, 2, 5, 6, 9, 10] {
            h.fetcher.fetch_block(height).await.unwrap();
        }

        let gaps = h.fetcher.detect_gaps(0, 10).unwrap();
        assert_eq!(
            gaps,
            vec![GapRange { start: 3, end: 4 }, GapRange { start: 7, end: 8 }]
        );

        h.fetcher.fill_gaps(&gaps).await.unwrap();
        assert!(h.fetcher.detect_gaps(0, 10).unwrap().is_empty());
        assert!(h.store.latest_height().unwrap().unwrap() >= 10);
    }

    // Invariant: concurrent and sequential runs produce the same stored
    // state.
    #[tokio::test]
    async fn test_concurrent_matches_sequential() {
        let sequential = harness(30, 2);
        sequential.fetcher.fetch_range(0, 30).await.unwrap();

        let concurrent = harness(30, 2);
        concurrent
            .fetcher
            .fetch_range_concurrent(0, 30)
            .await
            .unwrap();

        for height in 0..=30 {
            let a = sequential.store.block(height).unwrap().unwrap();
            let b = concurrent.store.block(height).unwrap().unwrap();
            assert_eq!(a.hash, b.hash);
            assert_eq!(a.transactions.len(), b.transactions.len());
        }

        // Derived balance state matches too.
        let probe = Address::repeat_byte(0x02);
        assert_eq!(
            sequential.index.balance(&probe).unwrap(),
            concurrent.index.balance(&probe).unwrap()
        );
        assert_eq!(
            sequential.index.balance_history(&probe).unwrap().len(),
            concurrent.index.balance_history(&probe).unwrap().len()
        );
    }

    // Invariant: an address's balance equals its baseline plus the sum of
    // its history deltas.
    #[tokio::test]
    async fn test_balance_equals_sum_of_deltas() {
        let h = harness(12, 2);
        h.fetcher.fetch_range(0, 12).await.unwrap();

        let recipient = Address::repeat_byte(0x02);
        let history = h.index.balance_history(&recipient).unwrap();
        assert!(!history.is_empty());

        let mut expected = U256::from(BASELINE_BALANCE);
        for delta in &history {
            if delta.negative {
                expected = expected.saturating_sub(delta.amount);
            } else {
                expected = expected.saturating_add(delta.amount);
            }
        }
        assert_eq!(h.index.balance(&recipient).unwrap(), expected);
    }

    // Consensus records persist for WBFT chains and the candidate list
    // resolves the seal bitmaps.
    #[tokio::test]
    async fn test_wbft_records_persisted() {
        let mut round_overrides = HashMap::new();
        round_overrides.insert(3u64, 2u32);
        let node = LocalNode::with_config(
            5,
            LocalNodeConfig {
                txs_per_block: 1,
                wbft: true,
                validators: 4,
                round_overrides,
                ..LocalNodeConfig::default()
            },
        );
        let h = harness_with(node, FetcherConfig::for_testing(), true);

        let mut sub = h.bus.subscribe(
            "consensus-probe",
            [EventKind::ConsensusBlock, EventKind::ConsensusError],
            EventFilter::all(),
            256,
        );

        h.fetcher.fetch_range(0, 5).await.unwrap();

        // Epoch 0 from block 0; signing records for every block.
        assert!(h.index.epoch(0).unwrap().is_some());
        assert!(h.index.block_extra(3).unwrap().is_some());
        let signing = h.index.signing_for_block(3).unwrap();
        assert_eq!(signing.len(), 4);
        assert!(signing.iter().all(|s| s.signed_prepare));
        assert_eq!(signing[0].round, 2);

        // Round 2 at height 3 publishes a round-change anomaly.
        let mut saw_round_change = false;
        while let Some(event) = sub.try_recv() {
            if let ChainEvent::ConsensusError(payload) = event {
                if payload.number == 3 {
                    saw_round_change = true;
                    assert_eq!(payload.round, 2);
                }
            }
        }
        assert!(saw_round_change, "round-change event missing");
    }

    // Boundary: receipts at the threshold stay sequential; one above
    // routes to the parallel path. Both produce the same stored state.
    #[tokio::test]
    async fn test_large_block_boundary() {
        // Threshold of 8 receipts (for_testing); 8 txs = boundary.
        let at_boundary = harness(1, 8);
        at_boundary.fetcher.fetch_range(0, 1).await.unwrap();

        let above = harness(1, 9);
        above.fetcher.fetch_range(0, 1).await.unwrap();

        for h in [&at_boundary, &above] {
            let block = h.store.block(1).unwrap().unwrap();
            assert!(h.store.missing_receipts(&block).unwrap().is_empty());
        }
    }

    // Genesis bootstrap runs exactly once and seeds the miner.
    #[tokio::test]
    async fn test_genesis_bootstrap() {
        let h = harness(3, 1);
        h.fetcher.fetch_range(0, 3).await.unwrap();

        let miner = Address::repeat_byte(0xee);
        assert!(h.index.has_balance(&miner).unwrap());
        assert_eq!(h.index.balance(&miner).unwrap(), U256::from(BASELINE_BALANCE));
        // No history rows for the miner: the baseline is not a delta.
        assert!(h.index.balance_history(&miner).unwrap().is_empty());
    }

    // Retry with backoff: scripted transport failures are retried and the
    // block still commits.
    #[tokio::test]
    async fn test_scripted_failures_are_retried() {
        let h = harness(5, 1);
        h.node.fail_next(2);

        h.fetcher.fetch_block(2).await.unwrap();
        assert!(h.store.has_block(2).unwrap());
        assert!(h.fetcher.stats().fetch_retries >= 2);
    }

    // The continuous follower indexes up to the tip and then picks up
    // newly produced blocks.
    #[tokio::test]
    async fn test_follower_tracks_tip() {
        let h = harness(4, 1);
        let fetcher = h.fetcher.clone();
        let cancel = fetcher.cancel_token();

        let run = tokio::spawn(async move { fetcher.run().await });

        // Wait for catch-up.
        for _ in 0..200 {
            if h.store.latest_height().unwrap() == Some(4) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.store.latest_height().unwrap(), Some(4));

        // Produce two more blocks; the follower should catch them.
        h.node.advance_tip(2);
        for _ in 0..200 {
            if h.store.latest_height().unwrap() == Some(6) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(h.store.latest_height().unwrap(), Some(6));

        cancel.cancel();
        let result = run.await.unwrap();
        assert!(result.is_err(), "cancelled run returns the cancel error");
    }

    // Startup recovery: gaps and receipt gaps below the latest indexed
    // height are filled before the follower takes over.
    #[tokio::test]
    async fn test_run_with_gap_recovery() {
        let h = harness(10, 2);

        // Seed a holey history: blocks {0,1,2,5,6,9,10} plus one block
        // missing its receipts.
        for height in [0u64, 1, 2, 5, 6, 9] {
            h.fetcher.fetch_block(height).await.unwrap();
        }
        let block10 = h.node.block_at(10);
        h.store.set_block(&block10).unwrap();
        h.store.set_latest_height(10).unwrap();

        let fetcher = h.fetcher.clone();
        let cancel = fetcher.cancel_token();
        let run = tokio::spawn(async move { fetcher.run_with_gap_recovery().await });

        for _ in 0..400 {
            let gaps_done = h.fetcher.detect_gaps(0, 10).unwrap().is_empty();
            let receipts_done = h.fetcher.detect_receipt_gaps(0, 10).unwrap().is_empty();
            if gaps_done && receipts_done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(h.fetcher.detect_gaps(0, 10).unwrap().is_empty());
        assert!(h.fetcher.detect_receipt_gaps(0, 10).unwrap().is_empty());
        assert!(h.store.latest_height().unwrap().unwrap() >= 10);

        cancel.cancel();
        let _ = run.await;
    }

    // Pending transactions surface as zero-block transaction events.
    #[tokio::test]
    async fn test_pending_tx_subscription() {
        let h = harness(3, 1);
        let mut sub = h.bus.subscribe(
            "pending-probe",
            [EventKind::Transaction],
            EventFilter::all(),
            16,
        );

        let handle = {
            let node: Arc<LocalNode> = h.node.clone();
            let kv = Arc::new(MemoryStore::new());
            let fetcher = FetcherBuilder::new(
                node.clone(),
                ChainStore::new(kv),
                h.bus.clone(),
            )
            .config(FetcherConfig::for_testing())
            .pending_source(node)
            .build();
            fetcher.start_pending_tx_subscription().unwrap()
        };

        let mut pending_tx = h.node.block_at(1).transactions[0].clone();
        pending_tx.hash = shared_types::Hash::repeat_byte(0xab);
        h.node.inject_pending(pending_tx);

        let event = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("timeout")
            .expect("event");
        match event {
            ChainEvent::Transaction(payload) => {
                assert!(payload.is_pending());
                assert_eq!(payload.tx_hash, shared_types::Hash::repeat_byte(0xab));
            }
            other => panic!("unexpected event {other:?}"),
        }

        handle.abort();
    }
}
