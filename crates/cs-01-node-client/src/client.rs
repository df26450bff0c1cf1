//! # Node Client Traits
//!
//! The mandatory RPC surface plus optional capability seams.

use crate::error::RpcError;
use async_trait::async_trait;
use ethereum_types::U256;
use shared_types::{Address, Block, FeeDelegation, Hash, Receipt, Transaction};
use tokio::sync::mpsc;

/// The upstream node the fetch pipeline reads from.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Height of the node's latest block.
    async fn latest_block_number(&self) -> Result<u64, RpcError>;

    /// Fetch a full block (with transactions) by height.
    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError>;

    /// Fetch all receipts of a block.
    async fn block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RpcError>;

    /// Resolve a transaction by hash.
    async fn transaction_by_hash(&self, hash: Hash) -> Result<Transaction, RpcError>;

    /// Native balance of `address` as of `height`.
    async fn balance_at(&self, address: Address, height: u64) -> Result<U256, RpcError>;

    /// The node's chain id.
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// The node's freeform client-version string.
    async fn client_version(&self) -> Result<String, RpcError>;
}

/// Optional capability: a stream of pending transaction hashes.
///
/// Wired into the pipeline only when the node supports it; pending
/// transactions are published with zero block number and hash so consumers
/// can tell them from mined ones.
pub trait PendingTxSource: Send + Sync {
    /// Open a stream of pending transaction hashes.
    fn subscribe_pending_txs(&self) -> mpsc::Receiver<Hash>;
}

/// Optional capability: per-block fee-delegation metadata.
#[async_trait]
pub trait FeeDelegationSource: Send + Sync {
    /// Fee-delegation records for all delegated transactions in a block.
    async fn fee_delegation_meta(&self, number: u64) -> Result<Vec<FeeDelegation>, RpcError>;
}
