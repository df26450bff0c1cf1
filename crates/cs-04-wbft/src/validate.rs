//! # Structural Seal Validation
//!
//! Non-cryptographic checks applied to every decoded seal: signature shape,
//! non-empty bitmap, and BFT quorum over the resolved signer count.
//! Cryptographic verification lives behind [`SealVerifier`].

use crate::bitmap::decode_sealers;
use crate::error::WbftError;
use crate::extra::{Candidate, Seal, SEAL_SIG_LEN};
use shared_types::Address;

/// BFT quorum for `n` candidates: ⌊2n/3⌋ + 1.
#[must_use]
pub fn quorum(n: usize) -> usize {
    (2 * n) / 3 + 1
}

/// Validate one seal against the candidate list.
///
/// Checks, in order: signature length exactly 96, signature not all-zero,
/// bitmap resolves to at least one signer, signer count ≥ quorum.
/// Returns the resolved candidate indices on success.
pub fn validate_seal(seal: &Seal, candidates: &[Candidate]) -> Result<Vec<usize>, WbftError> {
    if seal.signature.len() != SEAL_SIG_LEN {
        return Err(WbftError::BadSignatureLength(seal.signature.len()));
    }
    if seal.signature.iter().all(|&b| b == 0) {
        return Err(WbftError::ZeroSignature);
    }

    let signers = decode_sealers(&seal.bitmap, candidates.len());
    if signers.is_empty() {
        return Err(WbftError::EmptyBitmap);
    }

    let need = quorum(candidates.len());
    if signers.len() < need {
        return Err(WbftError::InsufficientSigners {
            got: signers.len(),
            need,
        });
    }

    Ok(signers)
}

/// A validator paired with its BLS public key, as needed for verification.
#[derive(Debug, Clone)]
pub struct ValidatorKey {
    /// Validator address.
    pub address: Address,
    /// BLS public key bytes.
    pub public_key: Vec<u8>,
}

/// Pluggable cryptographic seal verification.
///
/// Given the header hash, the seal, the validators with their keys, and
/// the round, an implementation returns `Ok(())` for a valid aggregate
/// signature. The indexer ships only the no-op implementation; chains that
/// need real verification plug their own in.
pub trait SealVerifier: Send + Sync {
    /// Verify an aggregated seal.
    fn verify(
        &self,
        header_hash: shared_types::Hash,
        seal: &Seal,
        validators: &[ValidatorKey],
        round: u32,
    ) -> Result<(), WbftError>;
}

/// Accepts every structurally valid seal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSealVerifier;

impl SealVerifier for NoopSealVerifier {
    fn verify(
        &self,
        _header_hash: shared_types::Hash,
        _seal: &Seal,
        _validators: &[ValidatorKey],
        _round: u32,
    ) -> Result<(), WbftError> {
        Ok(())
    }
}
