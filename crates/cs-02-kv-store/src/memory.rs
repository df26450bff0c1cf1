//! # In-Memory Store
//!
//! Ordered in-memory key-value store for unit tests. Production uses
//! [`crate::RocksDbStore`]; the `BTreeMap` here gives the same ascending
//! prefix-iteration order.

use crate::error::KvError;
use crate::store::{BatchOp, KvStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

/// `BTreeMap`-backed store with the ordered-iteration contract.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when no keys are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> Result<bool, KvError> {
        Ok(self.data.read().contains_key(key))
    }

    fn iterate_prefix(
        &self,
        prefix: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError> {
        let data = self.data.read();
        let range = data.range::<Vec<u8>, _>((Bound::Included(prefix.to_vec()), Bound::Unbounded));
        for (key, value) in range {
            if !key.starts_with(prefix) {
                break;
            }
            if !visitor(key, value) {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), KvError> {
        let mut data = self.data.write();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}
