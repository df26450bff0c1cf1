//! # System Contract Decoding
//!
//! A closed set of chain-reserved addresses emits governance and
//! validator-set events. Logs from these addresses are classified by their
//! `topics[0]` event signature into typed [`SystemEvent`]s; everything else
//! passes through undecoded.

use ethereum_types::{H256, U256};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shared_types::{Address, Hash, Log};
use tracing::warn;

/// The staking registry system address.
#[must_use]
pub fn staking_registry_address() -> Address {
    system_address(0x0400)
}

/// The governance system address.
#[must_use]
pub fn governance_address() -> Address {
    system_address(0x0401)
}

fn system_address(suffix: u16) -> Address {
    let mut bytes = [0u8; 20];
    bytes[18..].copy_from_slice(&suffix.to_be_bytes());
    Address::from(bytes)
}

fn event_signature(signature: &str) -> Hash {
    H256::from_slice(&Keccak256::digest(signature.as_bytes()))
}

/// A decoded system-contract event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemEvent {
    /// A validator joined the active set.
    ValidatorJoined {
        /// The joining validator.
        validator: Address,
    },
    /// A validator exited the active set.
    ValidatorExited {
        /// The exiting validator.
        validator: Address,
    },
    /// A validator's stake changed.
    StakeChanged {
        /// The affected validator.
        validator: Address,
        /// The new stake amount.
        amount: U256,
    },
    /// A governance parameter changed.
    GovernanceParamChanged {
        /// Parameter key.
        key: Hash,
        /// New value.
        value: U256,
    },
}

impl SystemEvent {
    /// True when the event changes validator-set membership or weight.
    #[must_use]
    pub fn affects_validator_set(&self) -> bool {
        !matches!(self, Self::GovernanceParamChanged { .. })
    }
}

/// Registry of system addresses and their event signatures.
pub struct SystemContracts {
    staking_registry: Address,
    governance: Address,
    sig_validator_joined: Hash,
    sig_validator_exited: Hash,
    sig_stake_changed: Hash,
    sig_param_changed: Hash,
}

impl Default for SystemContracts {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemContracts {
    /// Build the registry with the chain's reserved addresses.
    #[must_use]
    pub fn new() -> Self {
        Self {
            staking_registry: staking_registry_address(),
            governance: governance_address(),
            sig_validator_joined: event_signature("ValidatorJoined(address)"),
            sig_validator_exited: event_signature("ValidatorExited(address)"),
            sig_stake_changed: event_signature("StakeChanged(address,uint256)"),
            sig_param_changed: event_signature("GovernanceParamChanged(bytes32,uint256)"),
        }
    }

    /// True when the log's emitter is a known system address.
    #[must_use]
    pub fn is_system_address(&self, address: &Address) -> bool {
        *address == self.staking_registry || *address == self.governance
    }

    /// Classify a log into a system event.
    ///
    /// Returns `None` for non-system emitters and unknown signatures.
    /// Malformed payloads from a system address are warn-logged and skipped.
    #[must_use]
    pub fn decode(&self, log: &Log) -> Option<SystemEvent> {
        if !self.is_system_address(&log.address) {
            return None;
        }
        let sig = log.topics.first()?;

        let decoded = if *sig == self.sig_validator_joined {
            topic_address(log, 1).map(|validator| SystemEvent::ValidatorJoined { validator })
        } else if *sig == self.sig_validator_exited {
            topic_address(log, 1).map(|validator| SystemEvent::ValidatorExited { validator })
        } else if *sig == self.sig_stake_changed {
            topic_address(log, 1).map(|validator| SystemEvent::StakeChanged {
                validator,
                amount: data_u256(log),
            })
        } else if *sig == self.sig_param_changed {
            log.topics.get(1).map(|key| SystemEvent::GovernanceParamChanged {
                key: *key,
                value: data_u256(log),
            })
        } else {
            return None;
        };

        if decoded.is_none() {
            warn!(
                address = %log.address,
                block = log.block_number,
                "Malformed system contract log, skipping"
            );
        }
        decoded
    }
}

fn topic_address(log: &Log, index: usize) -> Option<Address> {
    log.topics
        .get(index)
        .map(|topic| Address::from_slice(&topic.as_bytes()[12..]))
}

fn data_u256(log: &Log) -> U256 {
    if log.data.len() >= 32 {
        U256::from_big_endian(&log.data[..32])
    } else {
        U256::zero()
    }
}
