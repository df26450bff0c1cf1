//! # Notifier Errors

use cs_02_kv_store::KvError;
use thiserror::Error;

/// Errors from notifier operations.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Configuration rejected at start.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A setting failed channel-specific validation.
    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    /// The requested setting or notification does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested status transition is not allowed.
    #[error("Notification {id} is {status} and cannot transition")]
    Terminal {
        /// Notification id.
        id: String,
        /// Its terminal status.
        status: String,
    },

    /// No handler is registered for the setting's channel.
    #[error("No handler for channel {0}")]
    NoHandler(String),

    /// The underlying KV store failed.
    #[error(transparent)]
    Storage(#[from] KvError),

    /// A stored row failed to encode or decode.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl NotifyError {
    /// Wrap a serializer error.
    pub fn codec(err: impl std::fmt::Display) -> Self {
        Self::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotifyError::Terminal {
            id: "abc".into(),
            status: "sent".into(),
        };
        assert!(err.to_string().contains("abc"));
        assert!(err.to_string().contains("sent"));
    }
}
