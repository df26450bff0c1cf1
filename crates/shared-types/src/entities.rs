//! # Core Chain Entities
//!
//! The persisted shapes of blocks, transactions, receipts, and logs.
//!
//! ## Clusters
//!
//! - **Chain**: [`Block`], [`Transaction`]
//! - **Execution results**: [`Receipt`], [`Log`]
//! - **Chain-specific extensions**: [`FeeDelegation`]

use ethereum_types::{H160, H256, U256};
use serde::{Deserialize, Serialize};

/// A 20-byte account or contract address.
pub type Address = H160;

/// A 32-byte Keccak-256 hash.
pub type Hash = H256;

/// Transaction type marker for fee-delegated transactions.
///
/// Fee-delegated transactions carry an additional fee-payer signature and
/// the fee payer is indexed alongside sender and recipient.
pub const TX_TYPE_FEE_DELEGATED: u8 = 0x16;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A block as fetched from the node and persisted by the indexer.
///
/// Exactly one block exists per height; re-indexing a height overwrites the
/// stored record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: Hash,
    /// Hash of the parent block.
    pub parent_hash: Hash,
    /// Coinbase / miner address.
    pub miner: Address,
    /// Total gas used by all transactions in the block.
    pub gas_used: u64,
    /// Block gas limit.
    pub gas_limit: u64,
    /// Unix timestamp of the block.
    pub timestamp: u64,
    /// Raw header extra-data payload (consensus-specific).
    pub extra_data: Vec<u8>,
    /// Full transactions contained in the block.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// True when the block contains the given transaction hash.
    #[must_use]
    pub fn contains(&self, tx_hash: &Hash) -> bool {
        self.transactions.iter().any(|tx| tx.hash == *tx_hash)
    }
}

/// A transaction embedded in a block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: Hash,
    /// Sender address (recovered by the node).
    pub from: Address,
    /// Recipient address; `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Gas limit for the transaction.
    pub gas: u64,
    /// Gas price in wei.
    pub gas_price: U256,
    /// Call data.
    pub input: Vec<u8>,
    /// Sender nonce.
    pub nonce: u64,
    /// Transaction envelope type.
    pub tx_type: u8,
    /// Position within the block.
    pub index: u32,
}

impl Transaction {
    /// True for the chain-specific fee-delegated envelope type.
    #[must_use]
    pub fn is_fee_delegated(&self) -> bool {
        self.tx_type == TX_TYPE_FEE_DELEGATED
    }
}

// =============================================================================
// CLUSTER B: EXECUTION RESULTS
// =============================================================================

/// An execution receipt for a mined transaction.
///
/// For every stored receipt the containing block record exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Receipt {
    /// Hash of the transaction this receipt belongs to.
    pub tx_hash: Hash,
    /// Height of the containing block.
    pub block_number: u64,
    /// Execution status: `true` on success.
    pub status: bool,
    /// Gas used by this transaction.
    pub gas_used: u64,
    /// Cumulative gas used in the block up to and including this tx.
    pub cumulative_gas_used: u64,
    /// Address of the created contract, for creation transactions.
    pub contract_address: Option<Address>,
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
    /// Effective gas price paid.
    pub effective_gas_price: U256,
}

/// A single log entry emitted by a contract.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Log {
    /// Emitting contract address.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature.
    pub topics: Vec<Hash>,
    /// ABI-encoded unindexed data.
    pub data: Vec<u8>,
    /// Height of the containing block.
    pub block_number: u64,
    /// Hash of the emitting transaction.
    pub tx_hash: Hash,
    /// Position of the log within the block.
    pub log_index: u32,
}

// =============================================================================
// CLUSTER C: CHAIN-SPECIFIC EXTENSIONS
// =============================================================================

/// Fee-delegation metadata for a single transaction.
///
/// Present only on chains whose node exposes the fee-delegation envelope
/// and only when the storage layer implements the matching writer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeeDelegation {
    /// Hash of the delegated transaction.
    pub tx_hash: Hash,
    /// Original (undelegated) transaction type.
    pub original_type: u8,
    /// The account paying the fee.
    pub fee_payer: Address,
    /// Fee-payer signature recovery id.
    pub sig_v: u64,
    /// Fee-payer signature r component.
    pub sig_r: Hash,
    /// Fee-payer signature s component.
    pub sig_s: Hash,
}
