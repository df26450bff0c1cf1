//! # Storage Capability Traits
//!
//! Each derived index is a distinct narrow interface. The fetch pipeline
//! holds an `Option<Arc<dyn …>>` per capability and silently degrades when
//! one is absent; [`crate::ChainIndex`] implements them all.

use crate::error::IndexError;
use crate::records::{BalanceChange, BalanceDelta, ContractCreation, Erc20Transfer, Erc721Transfer};
use cs_04_wbft::{EpochInfo, SigningActivity, WbftExtra};
use ethereum_types::U256;
use shared_types::{Address, FeeDelegation, Hash, Log};

/// Writes denormalized per-log secondary keys.
pub trait LogIndexWriter: Send + Sync {
    /// Index one log under its emitter address and topics.
    fn index_log(&self, log: &Log) -> Result<(), IndexError>;

    /// Tx hashes of logs emitted by `address`, ascending by (height, index).
    fn logs_by_address(&self, address: &Address) -> Result<Vec<Hash>, IndexError>;
}

/// Writes contract-creation, token-transfer, and per-address tx indices.
pub trait AddressIndexWriter: Send + Sync {
    /// Record a contract creation.
    fn save_contract_creation(&self, creation: &ContractCreation) -> Result<(), IndexError>;

    /// Record a decoded ERC-20 transfer.
    fn save_erc20_transfer(&self, transfer: &Erc20Transfer) -> Result<(), IndexError>;

    /// Record a decoded ERC-721 transfer.
    fn save_erc721_transfer(&self, transfer: &Erc721Transfer) -> Result<(), IndexError>;

    /// Add `tx_hash` to `address`'s transaction list.
    fn index_address_tx(
        &self,
        address: &Address,
        height: u64,
        tx_hash: &Hash,
    ) -> Result<(), IndexError>;

    /// Read back a contract-creation record.
    fn contract_creation(&self, contract: &Address) -> Result<Option<ContractCreation>, IndexError>;

    /// ERC-20 transfers of a token contract, ascending.
    fn erc20_transfers(&self, contract: &Address) -> Result<Vec<Erc20Transfer>, IndexError>;

    /// ERC-721 transfers of a token contract, ascending.
    fn erc721_transfers(&self, contract: &Address) -> Result<Vec<Erc721Transfer>, IndexError>;

    /// Tx hashes touching `address`, ascending by height.
    fn address_txs(&self, address: &Address) -> Result<Vec<Hash>, IndexError>;
}

/// Maintains current balances and append-only balance history.
pub trait BalanceWriter: Send + Sync {
    /// True once the address has been seeded.
    fn has_balance(&self, address: &Address) -> Result<bool, IndexError>;

    /// Set the address's baseline balance without a history row.
    fn seed_balance(&self, address: &Address, balance: U256) -> Result<(), IndexError>;

    /// Apply a delta and append the matching history row.
    fn apply_delta(
        &self,
        address: &Address,
        height: u64,
        tx_hash: &Hash,
        change: BalanceChange,
    ) -> Result<(), IndexError>;

    /// Current balance; zero when never seeded.
    fn balance(&self, address: &Address) -> Result<U256, IndexError>;

    /// Full history, ascending by height.
    fn balance_history(&self, address: &Address) -> Result<Vec<BalanceDelta>, IndexError>;
}

/// Persists parsed consensus records.
pub trait WbftWriter: Send + Sync {
    /// Store the parsed extra of one block.
    fn save_block_extra(&self, height: u64, extra: &WbftExtra) -> Result<(), IndexError>;

    /// Store epoch info observed at an epoch boundary.
    fn save_epoch(&self, info: &EpochInfo) -> Result<(), IndexError>;

    /// Store the per-validator signing records of one block.
    fn save_signing(&self, activity: &[SigningActivity]) -> Result<(), IndexError>;

    /// Read back a block's parsed extra.
    fn block_extra(&self, height: u64) -> Result<Option<WbftExtra>, IndexError>;

    /// Read back an epoch's info.
    fn epoch(&self, epoch: u64) -> Result<Option<EpochInfo>, IndexError>;

    /// Signing records of one block, ascending by validator index.
    fn signing_for_block(&self, height: u64) -> Result<Vec<SigningActivity>, IndexError>;
}

/// Persists fee-delegation metadata.
pub trait FeeDelegationWriter: Send + Sync {
    /// Store one fee-delegation record.
    fn save_fee_delegation(&self, meta: &FeeDelegation) -> Result<(), IndexError>;

    /// Read back a transaction's fee-delegation record.
    fn fee_delegation(&self, tx_hash: &Hash) -> Result<Option<FeeDelegation>, IndexError>;
}
