//! # Event Derivation
//!
//! Publishes the committed block's event fan-out: the block event before
//! the receipt pass, then one transaction event per transaction (receipt
//! lookups via a prebuilt map), one log event per receipt log, and
//! validator-set events for decoded system-contract activity. Publishing
//! is best-effort; drops are counted, never retried.

use crate::pipeline::Fetcher;
use cs_04_wbft::SystemEvent;
use shared_bus::{
    BlockPayload, ChainEvent, LogPayload, TransactionPayload, ValidatorChange, ValidatorSetPayload,
};
use shared_types::{Block, Hash, Receipt};
use std::collections::HashMap;

fn build_receipt_map(receipts: &[Receipt]) -> HashMap<Hash, &Receipt> {
    receipts.iter().map(|r| (r.tx_hash, r)).collect()
}

impl Fetcher {
    /// Publish the block event.
    pub(crate) fn publish_block_event(&self, block: &Block) {
        let accepted = self.bus.publish(&ChainEvent::Block(BlockPayload {
            number: block.number,
            hash: block.hash,
            miner: block.miner,
            gas_used: block.gas_used,
            timestamp: block.timestamp,
            tx_count: block.transactions.len(),
        }));
        self.stats.record_publish(accepted);
    }

    /// Publish transaction, log, and validator-set events for a block.
    pub(crate) fn publish_derived_events(
        &self,
        block: &Block,
        receipts: &[Receipt],
        system_events: &[SystemEvent],
    ) {
        let by_hash = build_receipt_map(receipts);

        for tx in &block.transactions {
            let receipt = by_hash.get(&tx.hash);
            let accepted = self.bus.publish(&ChainEvent::Transaction(TransactionPayload {
                tx_hash: tx.hash,
                block_number: block.number,
                block_hash: block.hash,
                from: tx.from,
                to: tx.to,
                value: tx.value,
                status: receipt.map(|r| r.status),
                contract_address: receipt.and_then(|r| r.contract_address),
            }));
            self.stats.record_publish(accepted);
        }

        for receipt in receipts {
            for log in &receipt.logs {
                let accepted = self.bus.publish(&ChainEvent::Log(LogPayload {
                    address: log.address,
                    topics: log.topics.clone(),
                    data: log.data.clone(),
                    block_number: log.block_number,
                    tx_hash: log.tx_hash,
                    log_index: log.log_index,
                }));
                self.stats.record_publish(accepted);
            }
        }

        for event in system_events {
            let (validator, change) = match event {
                SystemEvent::ValidatorJoined { validator } => {
                    (*validator, ValidatorChange::Joined)
                }
                SystemEvent::ValidatorExited { validator } => {
                    (*validator, ValidatorChange::Exited)
                }
                SystemEvent::StakeChanged { validator, .. } => {
                    (*validator, ValidatorChange::StakeChanged)
                }
                SystemEvent::GovernanceParamChanged { .. } => continue,
            };
            let accepted = self.bus.publish(&ChainEvent::ValidatorSet(ValidatorSetPayload {
                block_number: block.number,
                validator,
                change,
            }));
            self.stats.record_publish(accepted);
        }
    }
}
