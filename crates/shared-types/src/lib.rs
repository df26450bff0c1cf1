//! # Shared Types Crate
//!
//! Chain entities shared by every subsystem: blocks, transactions, receipts,
//! logs, fee-delegation metadata, and the hex-quantity codecs used at the
//! JSON-RPC boundary.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem chain types live here.
//! - **Opaque persistence**: entities are plain serde types; the storage
//!   layer decides the encoding.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod entities;
pub mod quantity;

pub use entities::{
    Address, Block, FeeDelegation, Hash, Log, Receipt, Transaction, TX_TYPE_FEE_DELEGATED,
};
pub use quantity::QuantityError;
