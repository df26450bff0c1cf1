//! # Keyspace Schema
//!
//! Every persisted chain entity lives under one of these prefixes. Numeric
//! components are fixed-width zero-padded (20 digits for u64, 10 for u32)
//! so that lexicographic order equals numeric order; addresses and hashes
//! are lowercase hex without a 0x prefix.

use cs_04_wbft::SigningActivity;
use shared_types::{Address, Hash};

/// Prefix for block records keyed by height.
pub const BLOCK: &str = "/block/";
/// Key of the latest committed height (the commit marker).
pub const LATEST: &str = "/latest";
/// Prefix for receipt records keyed by tx hash.
pub const RECEIPT: &str = "/receipt/";
/// Prefix for the per-address log index.
pub const LOG_ADDR: &str = "/log-index/addr/";
/// Prefix for the per-topic log index.
pub const LOG_TOPIC: &str = "/log-index/topic/";
/// Prefix for per-address transaction lists.
pub const ADDR_TX: &str = "/addr-tx/";
/// Prefix for contract-creation records keyed by contract address.
pub const CONTRACT_CREATED: &str = "/contract-created/";
/// Prefix for ERC-20 transfer records.
pub const ERC20_TRANSFER: &str = "/erc20-transfer/";
/// Prefix for ERC-721 transfer records.
pub const ERC721_TRANSFER: &str = "/erc721-transfer/";
/// Prefix for current native balances keyed by address.
pub const BALANCE: &str = "/balance/";
/// Prefix for per-address balance history.
pub const BALANCE_HIST: &str = "/balance-hist/";
/// Prefix for fee-delegation metadata keyed by tx hash.
pub const FEE_DELEG: &str = "/fee-deleg/";
/// Prefix for parsed consensus extras keyed by height.
pub const WBFT_EXTRA: &str = "/wbft/block-extra/";
/// Prefix for epoch info keyed by epoch number.
pub const WBFT_EPOCH: &str = "/wbft/epoch/";
/// Prefix for validator signing activity keyed by height and index.
pub const WBFT_SIGNING: &str = "/wbft/signing/";

/// Fixed-width form of a u64 key component.
#[must_use]
pub fn pad_u64(value: u64) -> String {
    format!("{value:020}")
}

/// Fixed-width form of a u32 key component.
#[must_use]
pub fn pad_u32(value: u32) -> String {
    format!("{value:010}")
}

/// Lowercase hex of an address, no prefix.
#[must_use]
pub fn addr_hex(address: &Address) -> String {
    format!("{address:x}")
}

/// Lowercase hex of a hash, no prefix.
#[must_use]
pub fn hash_hex(hash: &Hash) -> String {
    format!("{hash:x}")
}

/// `/block/{height}`
#[must_use]
pub fn block(height: u64) -> Vec<u8> {
    format!("{BLOCK}{}", pad_u64(height)).into_bytes()
}

/// `/receipt/{tx_hash}`
#[must_use]
pub fn receipt(tx_hash: &Hash) -> Vec<u8> {
    format!("{RECEIPT}{}", hash_hex(tx_hash)).into_bytes()
}

/// `/log-index/addr/{addr}/{height}/{log_index}`
#[must_use]
pub fn log_by_address(address: &Address, height: u64, log_index: u32) -> Vec<u8> {
    format!(
        "{LOG_ADDR}{}/{}/{}",
        addr_hex(address),
        pad_u64(height),
        pad_u32(log_index)
    )
    .into_bytes()
}

/// Prefix of one address's log index.
#[must_use]
pub fn log_by_address_prefix(address: &Address) -> Vec<u8> {
    format!("{LOG_ADDR}{}/", addr_hex(address)).into_bytes()
}

/// `/log-index/topic/{topic}/{height}/{log_index}`
#[must_use]
pub fn log_by_topic(topic: &Hash, height: u64, log_index: u32) -> Vec<u8> {
    format!(
        "{LOG_TOPIC}{}/{}/{}",
        hash_hex(topic),
        pad_u64(height),
        pad_u32(log_index)
    )
    .into_bytes()
}

/// `/addr-tx/{addr}/{height}{tx_hash}`
#[must_use]
pub fn addr_tx(address: &Address, height: u64, tx_hash: &Hash) -> Vec<u8> {
    format!(
        "{ADDR_TX}{}/{}{}",
        addr_hex(address),
        pad_u64(height),
        hash_hex(tx_hash)
    )
    .into_bytes()
}

/// Prefix of one address's transaction list.
#[must_use]
pub fn addr_tx_prefix(address: &Address) -> Vec<u8> {
    format!("{ADDR_TX}{}/", addr_hex(address)).into_bytes()
}

/// `/contract-created/{contract}`
#[must_use]
pub fn contract_created(contract: &Address) -> Vec<u8> {
    format!("{CONTRACT_CREATED}{}", addr_hex(contract)).into_bytes()
}

/// `/erc20-transfer/{contract}/{height}/{log_index}`
#[must_use]
pub fn erc20_transfer(contract: &Address, height: u64, log_index: u32) -> Vec<u8> {
    format!(
        "{ERC20_TRANSFER}{}/{}/{}",
        addr_hex(contract),
        pad_u64(height),
        pad_u32(log_index)
    )
    .into_bytes()
}

/// Prefix of one contract's ERC-20 transfers.
#[must_use]
pub fn erc20_transfer_prefix(contract: &Address) -> Vec<u8> {
    format!("{ERC20_TRANSFER}{}/", addr_hex(contract)).into_bytes()
}

/// `/erc721-transfer/{contract}/{height}/{log_index}`
#[must_use]
pub fn erc721_transfer(contract: &Address, height: u64, log_index: u32) -> Vec<u8> {
    format!(
        "{ERC721_TRANSFER}{}/{}/{}",
        addr_hex(contract),
        pad_u64(height),
        pad_u32(log_index)
    )
    .into_bytes()
}

/// Prefix of one contract's ERC-721 transfers.
#[must_use]
pub fn erc721_transfer_prefix(contract: &Address) -> Vec<u8> {
    format!("{ERC721_TRANSFER}{}/", addr_hex(contract)).into_bytes()
}

/// `/balance/{addr}`
#[must_use]
pub fn balance(address: &Address) -> Vec<u8> {
    format!("{BALANCE}{}", addr_hex(address)).into_bytes()
}

/// `/balance-hist/{addr}/{height}{tx_hash}`
#[must_use]
pub fn balance_hist(address: &Address, height: u64, tx_hash: &Hash) -> Vec<u8> {
    format!(
        "{BALANCE_HIST}{}/{}{}",
        addr_hex(address),
        pad_u64(height),
        hash_hex(tx_hash)
    )
    .into_bytes()
}

/// Prefix of one address's balance history.
#[must_use]
pub fn balance_hist_prefix(address: &Address) -> Vec<u8> {
    format!("{BALANCE_HIST}{}/", addr_hex(address)).into_bytes()
}

/// `/fee-deleg/{tx_hash}`
#[must_use]
pub fn fee_delegation(tx_hash: &Hash) -> Vec<u8> {
    format!("{FEE_DELEG}{}", hash_hex(tx_hash)).into_bytes()
}

/// `/wbft/block-extra/{height}`
#[must_use]
pub fn wbft_extra(height: u64) -> Vec<u8> {
    format!("{WBFT_EXTRA}{}", pad_u64(height)).into_bytes()
}

/// `/wbft/epoch/{epoch}`
#[must_use]
pub fn wbft_epoch(epoch: u64) -> Vec<u8> {
    format!("{WBFT_EPOCH}{}", pad_u64(epoch)).into_bytes()
}

/// `/wbft/signing/{height}/{validator_index}`
#[must_use]
pub fn wbft_signing(activity: &SigningActivity) -> Vec<u8> {
    format!(
        "{WBFT_SIGNING}{}/{}",
        pad_u64(activity.height),
        pad_u32(activity.validator_index)
    )
    .into_bytes()
}

/// Prefix of one block's signing records.
#[must_use]
pub fn wbft_signing_prefix(height: u64) -> Vec<u8> {
    format!("{WBFT_SIGNING}{}/", pad_u64(height)).into_bytes()
}
