//! # Chain Index (Subsystem 3)
//!
//! Everything the indexer persists about the chain, keyed under well-known
//! prefixes of the KV store:
//!
//! - [`ChainStore`]: blocks, receipts, and the latest-height commit marker.
//! - [`ChainIndex`]: the derived secondary indices, exposed to the fetch
//!   pipeline as narrow capability traits so a deployment can run any
//!   subset.
//!
//! Numeric key components are fixed-width zero-padded; prefix iteration
//! over any keyspace yields ascending numeric order.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod capabilities;
pub mod error;
pub mod index;
pub mod keys;
pub mod records;
pub mod store;

pub use capabilities::{
    AddressIndexWriter, BalanceWriter, FeeDelegationWriter, LogIndexWriter, WbftWriter,
};
pub use error::IndexError;
pub use index::ChainIndex;
pub use records::{
    erc20_transfer_signature, BalanceChange, BalanceDelta, ContractCreation, Erc20Transfer,
    Erc721Transfer, TokenTransfer,
};
pub use store::ChainStore;
