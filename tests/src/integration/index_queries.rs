//! # Derived-Index Query Scenarios
//!
//! Exercises the read side of every derived index after a full indexing
//! run: contract creations, token transfers, per-address transaction
//! lists (fee payer included), log indices, and fee-delegation records.

#[cfg(test)]
mod tests {
    use crate::local_node::{LocalNode, LocalNodeConfig};
    use cs_02_kv_store::MemoryStore;
    use cs_03_chain_index::{
        AddressIndexWriter, ChainIndex, ChainStore, FeeDelegationWriter, LogIndexWriter,
    };
    use cs_06_fetcher::{Fetcher, FetcherBuilder, FetcherConfig};
    use shared_bus::EventBus;
    use shared_types::Address;
    use std::sync::Arc;

    struct Harness {
        node: Arc<LocalNode>,
        fetcher: Arc<Fetcher>,
        store: ChainStore,
        index: Arc<ChainIndex>,
    }

    fn harness(tip: u64, fee_delegated: bool) -> Harness {
        let node = Arc::new(LocalNode::with_config(
            tip,
            LocalNodeConfig {
                txs_per_block: 3,
                fee_delegated,
                ..LocalNodeConfig::default()
            },
        ));
        let kv = Arc::new(MemoryStore::new());
        let store = ChainStore::new(kv.clone());
        let index = Arc::new(ChainIndex::new(kv));

        let mut builder = FetcherBuilder::new(node.clone(), store.clone(), EventBus::new())
            .config(FetcherConfig::for_testing())
            .log_index(index.clone())
            .address_index(index.clone())
            .balances(index.clone());
        if fee_delegated {
            builder = builder
                .fee_delegation_source(node.clone())
                .fee_delegation_writer(index.clone());
        }

        Harness {
            node,
            fetcher: builder.build(),
            store,
            index,
        }
    }

    #[tokio::test]
    async fn test_contract_creations_are_queryable() {
        let h = harness(4, false);
        h.fetcher.fetch_range(0, 4).await.unwrap();

        // Each block's second transaction creates a contract.
        for height in 0..=4u64 {
            let receipts = h.node.receipts_at(height);
            let contract = receipts[1].contract_address.unwrap();

            let creation = h.index.contract_creation(&contract).unwrap().unwrap();
            assert_eq!(creation.height, height);
            assert_eq!(creation.tx_hash, receipts[1].tx_hash);
            assert_eq!(creation.creator, h.node.block_at(height).transactions[1].from);
        }
    }

    #[tokio::test]
    async fn test_erc20_transfers_are_queryable() {
        let h = harness(5, false);
        h.fetcher.fetch_range(0, 5).await.unwrap();

        // Every block's first receipt carries one ERC-20 transfer from
        // the same token contract.
        let token = Address::repeat_byte(0xcc);
        let transfers = h.index.erc20_transfers(&token).unwrap();
        assert_eq!(transfers.len(), 6);

        let heights: Vec<u64> = transfers.iter().map(|t| t.height).collect();
        assert_eq!(heights, vec![0, 1, 2, 3, 4, 5]);
        assert!(transfers
            .iter()
            .all(|t| t.to == Address::repeat_byte(0x02)));

        // No ERC-721 activity on this chain.
        assert!(h.index.erc721_transfers(&token).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_address_tx_lists_cover_endpoints() {
        let h = harness(3, false);
        h.fetcher.fetch_range(0, 3).await.unwrap();

        // The shared recipient sees the non-creation transactions of
        // every block.
        let recipient = Address::repeat_byte(0x02);
        let txs = h.index.address_txs(&recipient).unwrap();
        assert_eq!(txs.len(), 8); // 2 transfers per block, 4 blocks

        // Senders see their own transactions.
        let block = h.node.block_at(2);
        let sender = block.transactions[0].from;
        let sender_txs = h.index.address_txs(&sender).unwrap();
        assert!(sender_txs.contains(&block.transactions[0].hash));
    }

    #[tokio::test]
    async fn test_log_index_by_emitter() {
        let h = harness(4, false);
        h.fetcher.fetch_range(0, 4).await.unwrap();

        let token = Address::repeat_byte(0xcc);
        let log_txs = h.index.logs_by_address(&token).unwrap();
        assert_eq!(log_txs.len(), 5);
        for (height, tx_hash) in log_txs.iter().enumerate() {
            assert_eq!(*tx_hash, LocalNode::tx_hash(height as u64, 0));
        }
    }

    #[tokio::test]
    async fn test_fee_delegation_records_and_payer_index() {
        let h = harness(3, true);
        h.fetcher.fetch_range(0, 3).await.unwrap();

        let fee_payer = Address::repeat_byte(0xfe);
        for height in 0..=3u64 {
            let tx_hash = LocalNode::tx_hash(height, 0);
            let meta = h.index.fee_delegation(&tx_hash).unwrap().unwrap();
            assert_eq!(meta.fee_payer, fee_payer);
            assert_eq!(meta.sig_v, 27);
        }

        // The fee payer shows up in the per-address transaction list.
        let payer_txs = h.index.address_txs(&fee_payer).unwrap();
        assert_eq!(payer_txs.len(), 4);
    }

    #[tokio::test]
    async fn test_receipts_belong_to_their_blocks() {
        let h = harness(5, false);
        h.fetcher.fetch_range(0, 5).await.unwrap();

        // Every stored receipt's tx hash appears in its containing block.
        for height in 0..=5u64 {
            let block = h.store.block(height).unwrap().unwrap();
            for receipt in h.node.receipts_at(height) {
                let stored = h.store.receipt(&receipt.tx_hash).unwrap().unwrap();
                assert_eq!(stored.block_number, height);
                assert!(block.contains(&stored.tx_hash));
            }
        }
    }
}
