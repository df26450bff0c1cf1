//! # RPC Errors

use thiserror::Error;

/// Errors from node RPC calls.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The transport failed before a response arrived.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The call exceeded its timeout.
    #[error("RPC call timed out")]
    Timeout,

    /// The HTTP layer returned a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The node returned a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Node-provided message.
        message: String,
    },

    /// The response body did not decode into the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The requested entity does not exist on the node.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl RpcError {
    /// True for failures worth retrying with backoff.
    ///
    /// Transport faults, timeouts, and server-side HTTP statuses are
    /// transient; decode errors and not-found are not.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status(code) => *code >= 500 || *code == 429,
            Self::Rpc { .. } | Self::Decode(_) | Self::NotFound(_) => false,
        }
    }
}
