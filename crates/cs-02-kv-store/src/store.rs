//! # KvStore Trait
//!
//! The storage seam every subsystem persists through.

use crate::error::KvError;

/// A single operation in an atomic batch write.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Convenience constructor for a put.
    #[must_use]
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Convenience constructor for a delete.
    #[must_use]
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self::Delete { key: key.into() }
    }
}

/// Ordered byte-key/byte-value map.
///
/// `iterate_prefix` visits keys in ascending lexicographic order and stops
/// when the visitor returns `false`.
pub trait KvStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Insert or overwrite `key`.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Remove `key`. Removing an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;

    /// True when `key` is present.
    fn has(&self, key: &[u8]) -> Result<bool, KvError>;

    /// Visit every `(key, value)` under `prefix` in ascending key order.
    ///
    /// The visitor returns `true` to continue, `false` to stop early.
    fn iterate_prefix(
        &self,
        prefix: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError>;

    /// Apply a batch of operations atomically.
    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), KvError>;
}
