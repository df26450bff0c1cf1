//! # Resume Errors

use crate::domain::Session;
use cs_02_kv_store::KvError;
use thiserror::Error;

/// Errors from resume-delivery operations.
#[derive(Debug, Error)]
pub enum ResumeError {
    /// No such session.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session's TTL has elapsed.
    ///
    /// The stale session rides along so callers can inspect it.
    #[error("Session {} expired", .0.id)]
    Expired(Box<Session>),

    /// The session exists but has no registered connection.
    #[error("Session {0} is not connected")]
    NotConnected(String),

    /// The underlying KV store failed.
    #[error(transparent)]
    Storage(#[from] KvError),

    /// A stored row failed to encode or decode.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl ResumeError {
    /// Wrap a serializer error.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}
