//! # Node Client (Subsystem 1)
//!
//! The seam between the indexer and the upstream EVM node.
//!
//! [`NodeClient`] covers the mandatory JSON-RPC surface; the optional
//! capabilities a richer node may expose are separate narrow traits
//! ([`PendingTxSource`], [`FeeDelegationSource`]) that the runtime wires
//! into the fetch pipeline only when present. The pipeline degrades
//! silently when a capability is absent.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod error;
pub mod http;
pub mod rpc_types;

pub use client::{FeeDelegationSource, NodeClient, PendingTxSource};
pub use error::RpcError;
pub use http::HttpNodeClient;
