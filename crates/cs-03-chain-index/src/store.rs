//! # Chain Store
//!
//! Blocks, receipts, and the latest-height commit marker.
//!
//! `set_latest_height` is the visibility boundary: a height is considered
//! indexed only after the marker write, so it must be the last write of a
//! block's commit group.

use crate::error::IndexError;
use crate::keys;
use cs_02_kv_store::KvStore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Block, Hash, Receipt};
use std::sync::Arc;

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, IndexError> {
    bincode::serialize(value).map_err(IndexError::codec)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, IndexError> {
    bincode::deserialize(bytes).map_err(IndexError::codec)
}

/// Block and receipt persistence over the KV store.
#[derive(Clone)]
pub struct ChainStore {
    kv: Arc<dyn KvStore>,
}

impl ChainStore {
    /// Wrap a KV store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Store a block, overwriting any previous record at that height.
    pub fn set_block(&self, block: &Block) -> Result<(), IndexError> {
        let bytes = encode(block)?;
        self.kv.put(&keys::block(block.number), &bytes)?;
        Ok(())
    }

    /// Read a block by height.
    pub fn block(&self, height: u64) -> Result<Option<Block>, IndexError> {
        match self.kv.get(&keys::block(height))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// True when a block is stored at `height`.
    pub fn has_block(&self, height: u64) -> Result<bool, IndexError> {
        Ok(self.kv.has(&keys::block(height))?)
    }

    /// The latest committed height, or `None` on an empty store.
    pub fn latest_height(&self) -> Result<Option<u64>, IndexError> {
        match self.kv.get(keys::LATEST.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| IndexError::Codec("latest height is not 8 bytes".into()))?;
                Ok(Some(u64::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    /// Write the commit marker.
    pub fn set_latest_height(&self, height: u64) -> Result<(), IndexError> {
        self.kv
            .put(keys::LATEST.as_bytes(), &height.to_be_bytes())?;
        Ok(())
    }

    /// Store one receipt.
    pub fn set_receipt(&self, receipt: &Receipt) -> Result<(), IndexError> {
        let bytes = encode(receipt)?;
        self.kv.put(&keys::receipt(&receipt.tx_hash), &bytes)?;
        Ok(())
    }

    /// Read a receipt by transaction hash.
    pub fn receipt(&self, tx_hash: &Hash) -> Result<Option<Receipt>, IndexError> {
        match self.kv.get(&keys::receipt(tx_hash))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// True when the receipt for `tx_hash` is stored.
    pub fn has_receipt(&self, tx_hash: &Hash) -> Result<bool, IndexError> {
        Ok(self.kv.has(&keys::receipt(tx_hash))?)
    }

    /// Transactions of `block` whose receipts are missing from storage.
    pub fn missing_receipts(&self, block: &Block) -> Result<Vec<Hash>, IndexError> {
        let mut missing = Vec::new();
        for tx in &block.transactions {
            if !self.has_receipt(&tx.hash)? {
                missing.push(tx.hash);
            }
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs_02_kv_store::MemoryStore;
    use shared_types::Transaction;

    fn store() -> ChainStore {
        ChainStore::new(Arc::new(MemoryStore::new()))
    }

    fn block_with_txs(number: u64, tx_hashes: &[Hash]) -> Block {
        Block {
            number,
            hash: Hash::repeat_byte(number as u8),
            transactions: tx_hashes
                .iter()
                .map(|&hash| Transaction {
                    hash,
                    ..Transaction::default()
                })
                .collect(),
            ..Block::default()
        }
    }

    #[test]
    fn test_block_round_trip() {
        let store = store();
        let block = block_with_txs(5, &[Hash::repeat_byte(1)]);

        assert!(!store.has_block(5).unwrap());
        store.set_block(&block).unwrap();
        assert!(store.has_block(5).unwrap());

        let loaded = store.block(5).unwrap().unwrap();
        assert_eq!(loaded.number, 5);
        assert_eq!(loaded.transactions.len(), 1);
    }

    #[test]
    fn test_set_block_overwrites() {
        let store = store();
        store.set_block(&block_with_txs(5, &[])).unwrap();
        store
            .set_block(&block_with_txs(5, &[Hash::repeat_byte(9)]))
            .unwrap();

        let loaded = store.block(5).unwrap().unwrap();
        assert_eq!(loaded.transactions.len(), 1);
    }

    #[test]
    fn test_latest_height() {
        let store = store();
        assert_eq!(store.latest_height().unwrap(), None);

        store.set_latest_height(17).unwrap();
        assert_eq!(store.latest_height().unwrap(), Some(17));
    }

    #[test]
    fn test_missing_receipts() {
        let store = store();
        let t1 = Hash::repeat_byte(1);
        let t2 = Hash::repeat_byte(2);
        let block = block_with_txs(3, &[t1, t2]);

        assert_eq!(store.missing_receipts(&block).unwrap(), vec![t1, t2]);

        store
            .set_receipt(&Receipt {
                tx_hash: t1,
                block_number: 3,
                ..Receipt::default()
            })
            .unwrap();
        assert_eq!(store.missing_receipts(&block).unwrap(), vec![t2]);
        assert!(store.has_receipt(&t1).unwrap());
        assert!(store.receipt(&t2).unwrap().is_none());
    }
}
