//! # Indexer Events
//!
//! The typed events that flow through the bus, published by the fetch
//! pipeline and consumed by the notification and resume subsystems.

use ethereum_types::U256;
use serde::{Deserialize, Serialize};
use shared_types::{Address, Hash};
use std::collections::HashSet;

/// Discriminant for event matching in subscriptions and settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A block was committed.
    Block,
    /// A transaction was committed (or observed pending).
    Transaction,
    /// A log was committed.
    Log,
    /// Per-block consensus participation summary.
    ConsensusBlock,
    /// A consensus anomaly (round change, low participation).
    ConsensusError,
    /// The validator set changed via a system contract.
    ValidatorSet,
}

impl EventKind {
    /// Stable string form used in persisted settings and payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Block => "block",
            Self::Transaction => "transaction",
            Self::Log => "log",
            Self::ConsensusBlock => "consensus_block",
            Self::ConsensusError => "consensus_error",
            Self::ValidatorSet => "validator_set",
        }
    }
}

/// Payload of a committed block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPayload {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: Hash,
    /// Coinbase address.
    pub miner: Address,
    /// Gas used by the whole block.
    pub gas_used: u64,
    /// Block timestamp.
    pub timestamp: u64,
    /// Number of transactions in the block.
    pub tx_count: usize,
}

/// Payload of a committed or pending transaction.
///
/// Pending transactions are marked with `block_number == 0` and a zero
/// `block_hash` so consumers can distinguish pending from mined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPayload {
    /// Transaction hash.
    pub tx_hash: Hash,
    /// Containing block height; zero for pending.
    pub block_number: u64,
    /// Containing block hash; zero for pending.
    pub block_hash: Hash,
    /// Sender address.
    pub from: Address,
    /// Recipient address; `None` for contract creation.
    pub to: Option<Address>,
    /// Transferred value in wei.
    pub value: U256,
    /// Execution status when mined.
    pub status: Option<bool>,
    /// Created contract address, for creation transactions.
    pub contract_address: Option<Address>,
}

impl TransactionPayload {
    /// True when this payload describes a pending (unmined) transaction.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.block_number == 0 && self.block_hash.is_zero()
    }
}

/// Payload of a committed log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogPayload {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics.
    pub topics: Vec<Hash>,
    /// Unindexed data.
    pub data: Vec<u8>,
    /// Containing block height.
    pub block_number: u64,
    /// Emitting transaction hash.
    pub tx_hash: Hash,
    /// Log position within the block.
    pub log_index: u32,
}

/// Per-block consensus participation counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsensusBlockPayload {
    /// Block height.
    pub number: u64,
    /// Consensus round that sealed the block.
    pub round: u32,
    /// Validators that signed the prepare phase.
    pub prepared_count: usize,
    /// Validators that signed the commit phase.
    pub committed_count: usize,
    /// Size of the active validator set.
    pub validator_count: usize,
}

/// Kinds of consensus anomalies surfaced as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusErrorKind {
    /// The block was sealed in a round greater than zero.
    RoundChange,
    /// Committed participation fell below the alerting threshold.
    LowParticipation,
}

/// Payload of a consensus anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusErrorPayload {
    /// Block height.
    pub number: u64,
    /// What went wrong.
    pub kind: ConsensusErrorKind,
    /// Round that sealed the block.
    pub round: u32,
    /// Committed participation in percent of the validator set.
    pub participation_percent: u32,
}

/// How the validator set changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorChange {
    /// A validator joined the set.
    Joined,
    /// A validator exited the set.
    Exited,
    /// A validator's stake changed.
    StakeChanged,
}

/// Payload of a validator-set change decoded from a system contract log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorSetPayload {
    /// Block height of the change.
    pub block_number: u64,
    /// The affected validator.
    pub validator: Address,
    /// What changed.
    pub change: ValidatorChange,
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainEvent {
    /// A block was committed to storage.
    Block(BlockPayload),
    /// A transaction was committed (or observed pending).
    Transaction(TransactionPayload),
    /// A log was committed.
    Log(LogPayload),
    /// Per-block consensus summary.
    ConsensusBlock(ConsensusBlockPayload),
    /// A consensus anomaly.
    ConsensusError(ConsensusErrorPayload),
    /// The validator set changed.
    ValidatorSet(ValidatorSetPayload),
}

impl ChainEvent {
    /// The kind discriminant of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Block(_) => EventKind::Block,
            Self::Transaction(_) => EventKind::Transaction,
            Self::Log(_) => EventKind::Log,
            Self::ConsensusBlock(_) => EventKind::ConsensusBlock,
            Self::ConsensusError(_) => EventKind::ConsensusError,
            Self::ValidatorSet(_) => EventKind::ValidatorSet,
        }
    }

    /// Block height the event refers to, where meaningful.
    #[must_use]
    pub fn block_number(&self) -> u64 {
        match self {
            Self::Block(p) => p.number,
            Self::Transaction(p) => p.block_number,
            Self::Log(p) => p.block_number,
            Self::ConsensusBlock(p) => p.number,
            Self::ConsensusError(p) => p.number,
            Self::ValidatorSet(p) => p.block_number,
        }
    }

    /// Serialize the inner payload for outbound channels.
    ///
    /// Payloads are plain serde types, so this cannot fail in practice;
    /// a defect in a payload type surfaces as `Value::Null`.
    #[must_use]
    pub fn payload_json(&self) -> serde_json::Value {
        let result = match self {
            Self::Block(p) => serde_json::to_value(p),
            Self::Transaction(p) => serde_json::to_value(p),
            Self::Log(p) => serde_json::to_value(p),
            Self::ConsensusBlock(p) => serde_json::to_value(p),
            Self::ConsensusError(p) => serde_json::to_value(p),
            Self::ValidatorSet(p) => serde_json::to_value(p),
        };
        result.unwrap_or(serde_json::Value::Null)
    }
}

/// Subscriber-side filter over matching events.
///
/// An empty filter matches everything of the subscribed kinds. Address
/// filtering applies to log emitters and transaction endpoints; topic
/// filtering applies to log topics.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to these addresses, when non-empty.
    pub addresses: HashSet<Address>,
    /// Restrict to logs carrying one of these topics, when non-empty.
    pub topics: HashSet<Hash>,
}

impl EventFilter {
    /// A filter that matches every event.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to the given addresses.
    #[must_use]
    pub fn addresses(addresses: impl IntoIterator<Item = Address>) -> Self {
        Self {
            addresses: addresses.into_iter().collect(),
            ..Self::default()
        }
    }

    /// True when the event passes this filter.
    #[must_use]
    pub fn matches(&self, event: &ChainEvent) -> bool {
        if !self.addresses.is_empty() {
            let hit = match event {
                ChainEvent::Log(p) => self.addresses.contains(&p.address),
                ChainEvent::Transaction(p) => {
                    self.addresses.contains(&p.from)
                        || p.to.is_some_and(|to| self.addresses.contains(&to))
                }
                ChainEvent::ValidatorSet(p) => self.addresses.contains(&p.validator),
                _ => true,
            };
            if !hit {
                return false;
            }
        }

        if !self.topics.is_empty() {
            if let ChainEvent::Log(p) = event {
                if !p.topics.iter().any(|t| self.topics.contains(t)) {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_round_trip() {
        let event = ChainEvent::Block(BlockPayload {
            number: 5,
            ..BlockPayload::default()
        });
        assert_eq!(event.kind(), EventKind::Block);
        assert_eq!(event.block_number(), 5);
        assert_eq!(EventKind::Block.as_str(), "block");
    }

    #[test]
    fn test_pending_marker() {
        let pending = TransactionPayload::default();
        assert!(pending.is_pending());

        let mined = TransactionPayload {
            block_number: 3,
            block_hash: Hash::repeat_byte(1),
            ..TransactionPayload::default()
        };
        assert!(!mined.is_pending());
    }

    #[test]
    fn test_filter_all_matches_everything() {
        let filter = EventFilter::all();
        let event = ChainEvent::Log(LogPayload::default());
        assert!(filter.matches(&event));
    }

    #[test]
    fn test_filter_by_address() {
        let target = Address::repeat_byte(0xaa);
        let filter = EventFilter::addresses([target]);

        let hit = ChainEvent::Log(LogPayload {
            address: target,
            ..LogPayload::default()
        });
        let miss = ChainEvent::Log(LogPayload {
            address: Address::repeat_byte(0xbb),
            ..LogPayload::default()
        });

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn test_filter_transaction_endpoints() {
        let target = Address::repeat_byte(0xaa);
        let filter = EventFilter::addresses([target]);

        let from_hit = ChainEvent::Transaction(TransactionPayload {
            from: target,
            ..TransactionPayload::default()
        });
        let to_hit = ChainEvent::Transaction(TransactionPayload {
            to: Some(target),
            ..TransactionPayload::default()
        });
        let miss = ChainEvent::Transaction(TransactionPayload::default());

        assert!(filter.matches(&from_hit));
        assert!(filter.matches(&to_hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn test_filter_by_topic() {
        let topic = Hash::repeat_byte(0x11);
        let filter = EventFilter {
            topics: [topic].into_iter().collect(),
            ..EventFilter::default()
        };

        let hit = ChainEvent::Log(LogPayload {
            topics: vec![topic],
            ..LogPayload::default()
        });
        let miss = ChainEvent::Log(LogPayload {
            topics: vec![Hash::repeat_byte(0x22)],
            ..LogPayload::default()
        });

        assert!(filter.matches(&hit));
        assert!(!filter.matches(&miss));
    }

    #[test]
    fn test_payload_json_shape() {
        let event = ChainEvent::Block(BlockPayload {
            number: 9,
            tx_count: 2,
            ..BlockPayload::default()
        });
        let value = event.payload_json();
        assert_eq!(value["number"], 9);
        assert_eq!(value["tx_count"], 2);
    }
}
