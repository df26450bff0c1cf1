//! # Storage Errors

use thiserror::Error;

/// Errors from key-value store operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// The underlying engine failed to open.
    #[error("Failed to open store: {message}")]
    Open {
        /// Engine-reported cause.
        message: String,
    },

    /// A read or write failed at the engine level.
    #[error("Storage I/O error: {message}")]
    Io {
        /// Engine-reported cause.
        message: String,
    },
}

impl KvError {
    /// Wrap an engine error message as an I/O failure.
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}
