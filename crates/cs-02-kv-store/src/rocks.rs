//! # RocksDB Storage Adapter
//!
//! Production implementation of the [`KvStore`] trait.
//!
//! ## Configuration
//!
//! Tuned for an append-mostly indexing workload:
//! - Snappy compression
//! - Bloom filters (10 bits per key)
//! - LRU block cache
//! - optional fsync per write for durability

use crate::error::KvError;
use crate::store::{BatchOp, KvStore};
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, WriteOptions, DB};
use std::path::Path;

/// RocksDB tuning knobs.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Path to the database directory.
    pub path: String,
    /// Block cache size in bytes.
    pub block_cache_size: usize,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of write buffers.
    pub max_write_buffer_number: i32,
    /// Enable fsync after each write.
    pub sync_writes: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: "./data/chainsentry".to_string(),
            block_cache_size: 256 * 1024 * 1024,
            write_buffer_size: 64 * 1024 * 1024,
            max_write_buffer_number: 3,
            sync_writes: true,
        }
    }
}

impl RocksDbConfig {
    /// Config for tests: small buffers, no fsync.
    #[must_use]
    pub fn for_testing(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            write_buffer_size: 4 * 1024 * 1024,
            max_write_buffer_number: 2,
            sync_writes: false,
        }
    }
}

/// RocksDB-backed key-value store.
pub struct RocksDbStore {
    db: DB,
    config: RocksDbConfig,
}

impl RocksDbStore {
    /// Open or create a database at the configured path.
    pub fn open(config: RocksDbConfig) -> Result<Self, KvError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_compression_type(rocksdb::DBCompressionType::Snappy);

        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_block_cache(&rocksdb::Cache::new_lru_cache(config.block_cache_size));
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &config.path).map_err(|e| KvError::Open {
            message: e.to_string(),
        })?;

        Ok(Self { db, config })
    }

    /// Open with default tuning.
    pub fn open_default(path: impl AsRef<Path>) -> Result<Self, KvError> {
        let config = RocksDbConfig {
            path: path.as_ref().to_string_lossy().to_string(),
            ..RocksDbConfig::default()
        };
        Self::open(config)
    }

    fn write_opts(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }
}

impl KvStore for RocksDbStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.db.get(key).map_err(|e| KvError::io(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.db
            .put_opt(key, value, &self.write_opts())
            .map_err(|e| KvError::io(e.to_string()))
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.db
            .delete_opt(key, &self.write_opts())
            .map_err(|e| KvError::io(e.to_string()))
    }

    fn has(&self, key: &[u8]) -> Result<bool, KvError> {
        self.db
            .get_pinned(key)
            .map(|v| v.is_some())
            .map_err(|e| KvError::io(e.to_string()))
    }

    fn iterate_prefix(
        &self,
        prefix: &[u8],
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> bool,
    ) -> Result<(), KvError> {
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) = item.map_err(|e| KvError::io(e.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            if !visitor(&key, &value) {
                break;
            }
        }
        Ok(())
    }

    fn write_batch(&self, ops: Vec<BatchOp>) -> Result<(), KvError> {
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                BatchOp::Put { key, value } => batch.put(&key, &value),
                BatchOp::Delete { key } => batch.delete(&key),
            }
        }
        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(|e| KvError::io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, RocksDbStore) {
        let dir = TempDir::new().unwrap();
        let config = RocksDbConfig::for_testing(dir.path().to_string_lossy().to_string());
        let store = RocksDbStore::open(config).unwrap();
        (dir, store)
    }

    #[test]
    fn test_basic_operations() {
        let (_dir, store) = open_temp();

        store.put(b"key1", b"value1").unwrap();
        assert_eq!(store.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert!(store.has(b"key1").unwrap());

        store.delete(b"key1").unwrap();
        assert!(!store.has(b"key1").unwrap());
    }

    #[test]
    fn test_prefix_iteration_order() {
        let (_dir, store) = open_temp();

        store.put(b"block/0003", b"c").unwrap();
        store.put(b"block/0001", b"a").unwrap();
        store.put(b"block/0002", b"b").unwrap();
        store.put(b"receipt/0001", b"r").unwrap();

        let mut values = Vec::new();
        store
            .iterate_prefix(b"block/", &mut |_, value| {
                values.push(value.to_vec());
                true
            })
            .unwrap();

        assert_eq!(values, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    }

    #[test]
    fn test_batch_write() {
        let (_dir, store) = open_temp();

        store
            .write_batch(vec![
                BatchOp::put(b"a".as_slice(), b"1".as_slice()),
                BatchOp::put(b"b".as_slice(), b"2".as_slice()),
            ])
            .unwrap();

        assert!(store.has(b"a").unwrap());
        assert!(store.has(b"b").unwrap());
    }
}
