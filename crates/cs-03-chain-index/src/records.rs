//! # Derived Index Records
//!
//! The value shapes written by the derived indices, plus the token-transfer
//! classifier. ERC-20 and ERC-721 share the `Transfer` event signature and
//! are disambiguated by topic count: 3 topics is ERC-20 (value in data),
//! 4 topics is ERC-721 (token id in `topics[3]`).

use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shared_types::{Address, Hash, Log};
use std::sync::OnceLock;

/// Keccak-256 of `Transfer(address,address,uint256)`.
#[must_use]
pub fn erc20_transfer_signature() -> Hash {
    static SIG: OnceLock<Hash> = OnceLock::new();
    *SIG.get_or_init(|| {
        H256::from_slice(&Keccak256::digest(
            b"Transfer(address,address,uint256)",
        ))
    })
}

/// A contract-creation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreation {
    /// The created contract.
    pub contract: Address,
    /// The creating account.
    pub creator: Address,
    /// Height of the creating block.
    pub height: u64,
    /// Hash of the creating transaction.
    pub tx_hash: Hash,
}

/// A decoded ERC-20 `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20Transfer {
    /// Token contract.
    pub contract: Address,
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Transferred amount.
    pub value: U256,
    /// Containing block height.
    pub height: u64,
    /// Log position within the block.
    pub log_index: u32,
    /// Emitting transaction.
    pub tx_hash: Hash,
}

/// A decoded ERC-721 `Transfer` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc721Transfer {
    /// Token contract.
    pub contract: Address,
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Transferred token id.
    pub token_id: U256,
    /// Containing block height.
    pub height: u64,
    /// Log position within the block.
    pub log_index: u32,
    /// Emitting transaction.
    pub tx_hash: Hash,
}

/// Either token-transfer flavor, as classified from a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenTransfer {
    /// Fungible transfer.
    Erc20(Erc20Transfer),
    /// Non-fungible transfer.
    Erc721(Erc721Transfer),
}

impl TokenTransfer {
    /// Classify a log as a token transfer.
    ///
    /// Returns `None` when `topics[0]` is not the Transfer signature or the
    /// topic count matches neither flavor.
    #[must_use]
    pub fn from_log(log: &Log) -> Option<Self> {
        if log.topics.first() != Some(&erc20_transfer_signature()) {
            return None;
        }

        let from = topic_address(log, 1)?;
        let to = topic_address(log, 2)?;

        match log.topics.len() {
            3 => {
                let value = if log.data.len() >= 32 {
                    U256::from_big_endian(&log.data[..32])
                } else {
                    U256::zero()
                };
                Some(Self::Erc20(Erc20Transfer {
                    contract: log.address,
                    from,
                    to,
                    value,
                    height: log.block_number,
                    log_index: log.log_index,
                    tx_hash: log.tx_hash,
                }))
            }
            4 => Some(Self::Erc721(Erc721Transfer {
                contract: log.address,
                from,
                to,
                token_id: U256::from_big_endian(log.topics[3].as_bytes()),
                height: log.block_number,
                log_index: log.log_index,
                tx_hash: log.tx_hash,
            })),
            _ => None,
        }
    }
}

fn topic_address(log: &Log, index: usize) -> Option<Address> {
    log.topics
        .get(index)
        .map(|topic| Address::from_slice(&topic.as_bytes()[12..]))
}

/// One applied balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceChange {
    /// Balance increased.
    Credit(U256),
    /// Balance decreased.
    Debit(U256),
}

/// One row of an address's balance history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDelta {
    /// Height at which the change applied.
    pub height: u64,
    /// True when the change was a debit.
    pub negative: bool,
    /// Magnitude of the change.
    pub amount: U256,
    /// The witnessing transaction.
    pub tx_hash: Hash,
}
