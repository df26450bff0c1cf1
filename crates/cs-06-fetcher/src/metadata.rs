//! # Metadata Pass
//!
//! Per-block derivation between the block write and the receipt pass:
//! consensus parsing, address indexing, balance tracking, fee delegation,
//! and the genesis bootstrap.
//!
//! Failure policy: decode problems are warn-logged and the block commit
//! continues without the derived record; storage write failures abort the
//! commit. The fee-delegation pass never aborts.

use crate::error::FetchError;
use crate::pipeline::Fetcher;
use cs_03_chain_index::{BalanceChange, ContractCreation, TokenTransfer};
use cs_04_wbft::{derive_signing_activity, validate_seal, BlockConsensus, WbftError};
use ethereum_types::U256;
use shared_bus::{
    ChainEvent, ConsensusBlockPayload, ConsensusErrorKind, ConsensusErrorPayload,
};
use shared_types::{Address, Block, Hash, Receipt};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Committed participation below this percentage raises an event.
const LOW_PARTICIPATION_PERCENT: u32 = 67;

impl Fetcher {
    /// Run the whole metadata pass for one block.
    pub(crate) async fn metadata_pass(
        &self,
        block: &Block,
        receipts: &[Receipt],
    ) -> Result<(), FetchError> {
        self.consensus_pass(block)?;
        self.address_index_pass(block, receipts)?;
        self.balance_pass(block, receipts).await?;
        if block.number == 0 {
            self.genesis_bootstrap(block).await?;
        }
        Ok(())
    }

    /// Parse and persist the block's consensus payload, derive signing
    /// activity, and publish consensus events.
    fn consensus_pass(&self, block: &Block) -> Result<(), FetchError> {
        let Some(adapter) = self.adapter.as_ref() else {
            return Ok(());
        };
        let Some(parser) = adapter.consensus_parser() else {
            return Ok(());
        };

        let height = block.number;
        let extra = match parser.parse(&block.extra_data) {
            Ok(extra) => extra,
            Err(err) => {
                warn!(height, error = %err, "Consensus extra parse failed");
                return Ok(());
            }
        };

        // Epoch boundaries refresh the candidate cache and persist the
        // epoch record; a malformed index list invalidates the whole epoch.
        if let Some(info) = &extra.epoch_info {
            match info.validators() {
                Ok(_) => {
                    if let Some(writer) = &self.wbft_writer {
                        writer
                            .save_epoch(info)
                            .map_err(|source| FetchError::Commit { height, source })?;
                    }
                    *self.candidates.write() = info.candidates.clone();
                    debug!(height, epoch = info.epoch, "Epoch boundary");
                }
                Err(err) => {
                    warn!(height, error = %err, "Invalid epoch info, skipping");
                }
            }
        }

        let candidates = self.candidates.read().clone();
        let consensus = derive_signing_activity(height, &extra, &candidates);

        // A structurally invalid seal loses its derived records but the
        // anomaly events below still go out (a thin commit seal is exactly
        // the low-participation case worth alerting on).
        match Self::validate_block_seals(&extra, &candidates) {
            Ok(()) => {
                if let Some(writer) = &self.wbft_writer {
                    writer
                        .save_block_extra(height, &extra)
                        .map_err(|source| FetchError::Commit { height, source })?;
                    writer
                        .save_signing(&consensus.activity)
                        .map_err(|source| FetchError::Commit { height, source })?;
                }
            }
            Err(err) => {
                warn!(height, error = %err, "Seal validation failed, skipping signing records");
            }
        }

        self.publish_consensus_events(&consensus);
        Ok(())
    }

    fn validate_block_seals(
        extra: &cs_04_wbft::WbftExtra,
        candidates: &[cs_04_wbft::Candidate],
    ) -> Result<(), WbftError> {
        if candidates.is_empty() {
            // No epoch observed yet; nothing to resolve bitmaps against.
            return Ok(());
        }
        if let Some(seal) = &extra.prepared {
            validate_seal(seal, candidates)?;
        }
        if let Some(seal) = &extra.committed {
            validate_seal(seal, candidates)?;
        }
        Ok(())
    }

    fn publish_consensus_events(&self, consensus: &BlockConsensus) {
        let accepted = self.bus.publish(&ChainEvent::ConsensusBlock(ConsensusBlockPayload {
            number: consensus.height,
            round: consensus.round,
            prepared_count: consensus.prepared_count,
            committed_count: consensus.committed_count,
            validator_count: consensus.validator_count,
        }));
        self.stats.record_publish(accepted);

        if consensus.round > 0 {
            let accepted = self.bus.publish(&ChainEvent::ConsensusError(ConsensusErrorPayload {
                number: consensus.height,
                kind: ConsensusErrorKind::RoundChange,
                round: consensus.round,
                participation_percent: consensus.participation_percent(),
            }));
            self.stats.record_publish(accepted);
        }

        let participation = consensus.participation_percent();
        if consensus.validator_count > 0 && participation < LOW_PARTICIPATION_PERCENT {
            let accepted = self.bus.publish(&ChainEvent::ConsensusError(ConsensusErrorPayload {
                number: consensus.height,
                kind: ConsensusErrorKind::LowParticipation,
                round: consensus.round,
                participation_percent: participation,
            }));
            self.stats.record_publish(accepted);
        }
    }

    /// Contract creations, token transfers, and per-address tx lists.
    fn address_index_pass(&self, block: &Block, receipts: &[Receipt]) -> Result<(), FetchError> {
        let Some(writer) = self.addr_writer.as_ref() else {
            return Ok(());
        };
        let height = block.number;
        let by_hash: HashMap<Hash, &Receipt> = receipts.iter().map(|r| (r.tx_hash, r)).collect();

        for tx in &block.transactions {
            let receipt = by_hash.get(&tx.hash);

            if tx.to.is_none() {
                if let Some(contract) = receipt.and_then(|r| r.contract_address) {
                    if !contract.is_zero() {
                        writer
                            .save_contract_creation(&ContractCreation {
                                contract,
                                creator: tx.from,
                                height,
                                tx_hash: tx.hash,
                            })
                            .map_err(|source| FetchError::Commit { height, source })?;
                    }
                }
            }

            writer
                .index_address_tx(&tx.from, height, &tx.hash)
                .map_err(|source| FetchError::Commit { height, source })?;
            if let Some(to) = tx.to {
                if to != tx.from {
                    writer
                        .index_address_tx(&to, height, &tx.hash)
                        .map_err(|source| FetchError::Commit { height, source })?;
                }
            }
        }

        for receipt in receipts {
            for log in &receipt.logs {
                match TokenTransfer::from_log(log) {
                    Some(TokenTransfer::Erc20(transfer)) => {
                        writer
                            .save_erc20_transfer(&transfer)
                            .map_err(|source| FetchError::Commit { height, source })?;
                    }
                    Some(TokenTransfer::Erc721(transfer)) => {
                        writer
                            .save_erc721_transfer(&transfer)
                            .map_err(|source| FetchError::Commit { height, source })?;
                    }
                    None => {}
                }
            }
        }

        Ok(())
    }

    /// Apply per-transaction native balance deltas.
    async fn balance_pass(&self, block: &Block, receipts: &[Receipt]) -> Result<(), FetchError> {
        let Some(writer) = self.balance_writer.as_ref() else {
            return Ok(());
        };
        let height = block.number;
        let by_hash: HashMap<Hash, &Receipt> = receipts.iter().map(|r| (r.tx_hash, r)).collect();

        for tx in &block.transactions {
            let receipt = by_hash.get(&tx.hash);
            let gas_used = receipt.map_or(0, |r| r.gas_used);
            let fee = tx.gas_price.saturating_mul(U256::from(gas_used));
            let sender_debit = tx.value.saturating_add(fee);

            self.ensure_balance_initialized(&tx.from, height).await?;
            writer
                .apply_delta(&tx.from, height, &tx.hash, BalanceChange::Debit(sender_debit))
                .map_err(|source| FetchError::Commit { height, source })?;

            // Contract creations credit the created address.
            let recipient = tx
                .to
                .or_else(|| receipt.and_then(|r| r.contract_address));
            if let Some(recipient) = recipient {
                self.ensure_balance_initialized(&recipient, height).await?;
                writer
                    .apply_delta(
                        &recipient,
                        height,
                        &tx.hash,
                        BalanceChange::Credit(tx.value),
                    )
                    .map_err(|source| FetchError::Commit { height, source })?;
            }
        }

        Ok(())
    }

    /// Seed an address's baseline from the node on first observation.
    ///
    /// The true balance one block before the current height becomes the
    /// baseline; an RPC failure seeds zero with a warning rather than
    /// aborting the commit.
    async fn ensure_balance_initialized(
        &self,
        address: &Address,
        height: u64,
    ) -> Result<(), FetchError> {
        let Some(writer) = self.balance_writer.as_ref() else {
            return Ok(());
        };
        if writer
            .has_balance(address)
            .map_err(|source| FetchError::Commit { height, source })?
        {
            return Ok(());
        }

        let baseline = if height == 0 {
            U256::zero()
        } else {
            match self.client.balance_at(*address, height - 1).await {
                Ok(balance) => balance,
                Err(err) => {
                    warn!(
                        address = %address,
                        height,
                        error = %err,
                        "Baseline balance fetch failed, seeding zero"
                    );
                    U256::zero()
                }
            }
        };

        writer
            .seed_balance(address, baseline)
            .map_err(|source| FetchError::Commit { height, source })
    }

    /// At height zero, ensure the genesis miner has a baseline.
    async fn genesis_bootstrap(&self, block: &Block) -> Result<(), FetchError> {
        let Some(writer) = self.balance_writer.as_ref() else {
            return Ok(());
        };
        if writer
            .has_balance(&block.miner)
            .map_err(|source| FetchError::Commit { height: 0, source })?
        {
            return Ok(());
        }

        let balance = match self.client.balance_at(block.miner, 0).await {
            Ok(balance) => balance,
            Err(err) => {
                warn!(miner = %block.miner, error = %err, "Genesis miner balance fetch failed");
                U256::zero()
            }
        };
        writer
            .seed_balance(&block.miner, balance)
            .map_err(|source| FetchError::Commit { height: 0, source })
    }

    /// Fetch and store fee-delegation metadata.
    ///
    /// Runs only when both the client and storage capabilities exist.
    /// Every failure here is logged and the commit continues.
    pub(crate) async fn fee_delegation_pass(&self, block: &Block) {
        let (Some(source), Some(writer)) = (self.fee_source.as_ref(), self.fee_writer.as_ref())
        else {
            return;
        };
        if !block.transactions.iter().any(|tx| tx.is_fee_delegated()) {
            return;
        }

        let height = block.number;
        let metas = match source.fee_delegation_meta(height).await {
            Ok(metas) => metas,
            Err(err) => {
                warn!(height, error = %err, "Fee-delegation fetch failed");
                return;
            }
        };

        for meta in metas {
            if let Err(err) = writer.save_fee_delegation(&meta) {
                warn!(height, tx_hash = %meta.tx_hash, error = %err, "Fee-delegation write failed");
                continue;
            }
            // Fee payers join the per-address transaction index too.
            if let Some(addr_writer) = &self.addr_writer {
                if let Err(err) = addr_writer.index_address_tx(&meta.fee_payer, height, &meta.tx_hash)
                {
                    warn!(height, error = %err, "Fee-payer index write failed");
                }
            }
        }
    }
}
