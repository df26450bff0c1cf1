//! # Index Errors

use cs_02_kv_store::KvError;
use thiserror::Error;

/// Errors from chain-index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The underlying KV store failed.
    #[error(transparent)]
    Kv(#[from] KvError),

    /// A stored value failed to encode or decode.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl IndexError {
    /// Wrap a serializer error.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
