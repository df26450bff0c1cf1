//! # Decode Errors

use thiserror::Error;

/// Errors from consensus payload decoding and structural validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WbftError {
    /// The extra-data field is shorter than vanity + seal.
    #[error("Extra data too short: {got} bytes, need at least {need}")]
    ExtraTooShort {
        /// Bytes present.
        got: usize,
        /// Minimum required.
        need: usize,
    },

    /// The structured payload failed RLP decoding.
    #[error("Invalid consensus payload: {0}")]
    Rlp(String),

    /// A seal signature was not exactly 96 bytes.
    #[error("Seal signature length {0}, expected 96")]
    BadSignatureLength(usize),

    /// A seal signature was all zeros.
    #[error("Seal signature is all zeros")]
    ZeroSignature,

    /// A seal bitmap resolved to no signers.
    #[error("Seal bitmap is empty")]
    EmptyBitmap,

    /// Fewer signers than the BFT quorum.
    #[error("Insufficient signers: {got} < {need}")]
    InsufficientSigners {
        /// Resolved signer count.
        got: usize,
        /// Required quorum.
        need: usize,
    },

    /// A validator index pointed outside the candidate list.
    #[error("Validator index {index} out of range for {candidates} candidates")]
    BadValidatorIndex {
        /// The offending index.
        index: u64,
        /// Candidate list length.
        candidates: usize,
    },
}

impl From<rlp::DecoderError> for WbftError {
    fn from(err: rlp::DecoderError) -> Self {
        Self::Rlp(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WbftError::InsufficientSigners { got: 2, need: 3 };
        assert!(err.to_string().contains("2 < 3"));

        let err = WbftError::BadValidatorIndex {
            index: 9,
            candidates: 4,
        };
        assert!(err.to_string().contains('9'));
    }
}
