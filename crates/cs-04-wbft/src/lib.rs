//! # WBFT Decoders (Subsystem 4)
//!
//! Pure decoding of the chain's consensus artifacts:
//!
//! - the header extra-data payload (vanity ∥ RLP consensus payload ∥ BLS
//!   seal) into rounds, seals, and optional epoch info,
//! - sealer bitmaps into candidate indices,
//! - per-block validator signing activity derived from seals × candidates,
//! - logs emitted by the closed set of system contracts into typed events.
//!
//! Cryptographic seal verification is out of scope here; it hangs off the
//! pluggable [`SealVerifier`] trait.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod activity;
pub mod bitmap;
pub mod error;
pub mod extra;
pub mod system_contracts;
pub mod validate;

pub use activity::{derive_signing_activity, BlockConsensus, SigningActivity};
pub use bitmap::{decode_sealers, encode_sealers};
pub use error::WbftError;
pub use extra::{Candidate, EpochInfo, Seal, WbftExtra, BLS_SEAL_LEN, VANITY_LEN};
pub use system_contracts::{SystemContracts, SystemEvent};
pub use validate::{quorum, validate_seal, NoopSealVerifier, SealVerifier};
