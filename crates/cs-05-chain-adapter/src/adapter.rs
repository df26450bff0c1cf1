//! # Adapter Facade
//!
//! The traits the fetch pipeline consumes, and the two implementations:
//! WBFT chains and generic EVM chains.

use cs_04_wbft::{SystemContracts, SystemEvent, WbftError, WbftExtra};
use shared_types::Log;

/// What kind of consensus payload the chain's headers carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusKind {
    /// WBFT: extra-data carries rounds, seals, and epoch info.
    Wbft,
    /// Nothing the indexer knows how to parse.
    Unknown,
}

/// Static facts about the connected chain.
#[derive(Debug, Clone)]
pub struct ChainInfo {
    /// Human-readable chain name.
    pub name: String,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Header consensus payload kind.
    pub consensus: ConsensusKind,
}

/// Parses a header's extra-data into the consensus payload.
pub trait ConsensusParser: Send + Sync {
    /// Decode the raw extra-data field.
    fn parse(&self, extra_data: &[u8]) -> Result<WbftExtra, WbftError>;
}

/// Classifies logs emitted by the chain's system contracts.
pub trait SystemContractDecoder: Send + Sync {
    /// Decode a log into a system event, `None` for ordinary logs.
    fn decode_system_log(&self, log: &Log) -> Option<SystemEvent>;
}

impl SystemContractDecoder for SystemContracts {
    fn decode_system_log(&self, log: &Log) -> Option<SystemEvent> {
        self.decode(log)
    }
}

/// Per-chain facade handed to the fetch pipeline.
pub trait ChainAdapter: Send + Sync {
    /// Static chain facts.
    fn info(&self) -> &ChainInfo;

    /// The consensus parser, when headers carry a known payload.
    fn consensus_parser(&self) -> Option<&dyn ConsensusParser>;

    /// The system-contract decoder, when the chain reserves any.
    fn system_contracts(&self) -> Option<&dyn SystemContractDecoder>;
}

struct WbftParser;

impl ConsensusParser for WbftParser {
    fn parse(&self, extra_data: &[u8]) -> Result<WbftExtra, WbftError> {
        WbftExtra::decode(extra_data)
    }
}

/// Adapter for WBFT chains: consensus parse plus system contracts.
pub struct WbftAdapter {
    info: ChainInfo,
    parser: WbftParser,
    contracts: SystemContracts,
}

impl WbftAdapter {
    /// Build the adapter for a WBFT chain.
    #[must_use]
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            info: ChainInfo {
                name: name.into(),
                chain_id,
                consensus: ConsensusKind::Wbft,
            },
            parser: WbftParser,
            contracts: SystemContracts::new(),
        }
    }
}

impl ChainAdapter for WbftAdapter {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    fn consensus_parser(&self) -> Option<&dyn ConsensusParser> {
        Some(&self.parser)
    }

    fn system_contracts(&self) -> Option<&dyn SystemContractDecoder> {
        Some(&self.contracts)
    }
}

/// Adapter for chains the indexer has no special knowledge of.
pub struct GenericAdapter {
    info: ChainInfo,
}

impl GenericAdapter {
    /// Build a generic adapter.
    #[must_use]
    pub fn new(name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            info: ChainInfo {
                name: name.into(),
                chain_id,
                consensus: ConsensusKind::Unknown,
            },
        }
    }
}

impl ChainAdapter for GenericAdapter {
    fn info(&self) -> &ChainInfo {
        &self.info
    }

    fn consensus_parser(&self) -> Option<&dyn ConsensusParser> {
        None
    }

    fn system_contracts(&self) -> Option<&dyn SystemContractDecoder> {
        None
    }
}
