//! # Chain Adapter (Subsystem 5)
//!
//! A per-chain facade bundling what the fetch pipeline needs to know about
//! the connected chain beyond plain JSON-RPC: whether headers carry a
//! parseable consensus payload and which addresses are system contracts.
//!
//! The [`factory`] classifies the connected node from its freeform
//! `web3_clientVersion` string and chain id, falling back to a generic
//! adapter (no consensus parse, no system contracts) for unknown nodes.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapter;
pub mod factory;

pub use adapter::{
    ChainAdapter, ChainInfo, ConsensusKind, ConsensusParser, GenericAdapter, SystemContractDecoder,
    WbftAdapter,
};
pub use factory::{classify_client_version, detect};
