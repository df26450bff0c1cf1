//! # Chain Index
//!
//! The derived-index implementation over the KV store. One struct carries
//! every capability; deployments that want a subset hand the fetch pipeline
//! only the trait objects they care about.

use crate::capabilities::{
    AddressIndexWriter, BalanceWriter, FeeDelegationWriter, LogIndexWriter, WbftWriter,
};
use crate::error::IndexError;
use crate::keys;
use crate::records::{BalanceChange, BalanceDelta, ContractCreation, Erc20Transfer, Erc721Transfer};
use crate::store::{decode, encode};
use cs_02_kv_store::KvStore;
use cs_04_wbft::{EpochInfo, SigningActivity, WbftExtra};
use ethereum_types::U256;
use shared_types::{Address, FeeDelegation, Hash, Log};
use std::sync::Arc;
use tracing::warn;

/// All derived indices over one KV store.
#[derive(Clone)]
pub struct ChainIndex {
    kv: Arc<dyn KvStore>,
}

impl ChainIndex {
    /// Wrap a KV store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn collect_values<T: serde::de::DeserializeOwned>(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<T>, IndexError> {
        let mut rows = Vec::new();
        let mut codec_err = None;
        self.kv.iterate_prefix(prefix, &mut |_, value| {
            match decode::<T>(value) {
                Ok(row) => {
                    rows.push(row);
                    true
                }
                Err(err) => {
                    codec_err = Some(err);
                    false
                }
            }
        })?;
        match codec_err {
            Some(err) => Err(err),
            None => Ok(rows),
        }
    }
}

impl LogIndexWriter for ChainIndex {
    fn index_log(&self, log: &Log) -> Result<(), IndexError> {
        let pointer = encode(&log.tx_hash)?;
        self.kv.put(
            &keys::log_by_address(&log.address, log.block_number, log.log_index),
            &pointer,
        )?;
        for topic in &log.topics {
            self.kv.put(
                &keys::log_by_topic(topic, log.block_number, log.log_index),
                &pointer,
            )?;
        }
        Ok(())
    }

    fn logs_by_address(&self, address: &Address) -> Result<Vec<Hash>, IndexError> {
        self.collect_values(&keys::log_by_address_prefix(address))
    }
}

impl AddressIndexWriter for ChainIndex {
    fn save_contract_creation(&self, creation: &ContractCreation) -> Result<(), IndexError> {
        let bytes = encode(creation)?;
        self.kv
            .put(&keys::contract_created(&creation.contract), &bytes)?;
        Ok(())
    }

    fn save_erc20_transfer(&self, transfer: &Erc20Transfer) -> Result<(), IndexError> {
        let bytes = encode(transfer)?;
        self.kv.put(
            &keys::erc20_transfer(&transfer.contract, transfer.height, transfer.log_index),
            &bytes,
        )?;
        Ok(())
    }

    fn save_erc721_transfer(&self, transfer: &Erc721Transfer) -> Result<(), IndexError> {
        let bytes = encode(transfer)?;
        self.kv.put(
            &keys::erc721_transfer(&transfer.contract, transfer.height, transfer.log_index),
            &bytes,
        )?;
        Ok(())
    }

    fn index_address_tx(
        &self,
        address: &Address,
        height: u64,
        tx_hash: &Hash,
    ) -> Result<(), IndexError> {
        self.kv
            .put(&keys::addr_tx(address, height, tx_hash), &[1u8])?;
        Ok(())
    }

    fn contract_creation(
        &self,
        contract: &Address,
    ) -> Result<Option<ContractCreation>, IndexError> {
        match self.kv.get(&keys::contract_created(contract))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn erc20_transfers(&self, contract: &Address) -> Result<Vec<Erc20Transfer>, IndexError> {
        self.collect_values(&keys::erc20_transfer_prefix(contract))
    }

    fn erc721_transfers(&self, contract: &Address) -> Result<Vec<Erc721Transfer>, IndexError> {
        self.collect_values(&keys::erc721_transfer_prefix(contract))
    }

    fn address_txs(&self, address: &Address) -> Result<Vec<Hash>, IndexError> {
        let prefix = keys::addr_tx_prefix(address);
        let mut hashes = Vec::new();
        self.kv.iterate_prefix(&prefix, &mut |key, _| {
            // Key layout: {prefix}{height:020}{tx_hash:064}
            if key.len() >= prefix.len() + 20 + 64 {
                let hex = &key[prefix.len() + 20..];
                if let Ok(bytes) = hex::decode(hex) {
                    hashes.push(Hash::from_slice(&bytes));
                }
            }
            true
        })?;
        Ok(hashes)
    }
}

impl BalanceWriter for ChainIndex {
    fn has_balance(&self, address: &Address) -> Result<bool, IndexError> {
        Ok(self.kv.has(&keys::balance(address))?)
    }

    fn seed_balance(&self, address: &Address, balance: U256) -> Result<(), IndexError> {
        let bytes = encode(&balance)?;
        self.kv.put(&keys::balance(address), &bytes)?;
        Ok(())
    }

    fn apply_delta(
        &self,
        address: &Address,
        height: u64,
        tx_hash: &Hash,
        change: BalanceChange,
    ) -> Result<(), IndexError> {
        let current = self.balance(address)?;
        let (next, delta) = match change {
            BalanceChange::Credit(amount) => (
                current.saturating_add(amount),
                BalanceDelta {
                    height,
                    negative: false,
                    amount,
                    tx_hash: *tx_hash,
                },
            ),
            BalanceChange::Debit(amount) => {
                let next = if amount > current {
                    // A debit below zero means the baseline was seeded
                    // without true history; clamp rather than wrap.
                    warn!(address = %address, height, "Balance debit exceeds tracked balance");
                    U256::zero()
                } else {
                    current - amount
                };
                (
                    next,
                    BalanceDelta {
                        height,
                        negative: true,
                        amount,
                        tx_hash: *tx_hash,
                    },
                )
            }
        };

        self.kv.put(&keys::balance(address), &encode(&next)?)?;
        self.kv.put(
            &keys::balance_hist(address, height, tx_hash),
            &encode(&delta)?,
        )?;
        Ok(())
    }

    fn balance(&self, address: &Address) -> Result<U256, IndexError> {
        match self.kv.get(&keys::balance(address))? {
            Some(bytes) => decode(&bytes),
            None => Ok(U256::zero()),
        }
    }

    fn balance_history(&self, address: &Address) -> Result<Vec<BalanceDelta>, IndexError> {
        self.collect_values(&keys::balance_hist_prefix(address))
    }
}

impl WbftWriter for ChainIndex {
    fn save_block_extra(&self, height: u64, extra: &WbftExtra) -> Result<(), IndexError> {
        let bytes = encode(extra)?;
        self.kv.put(&keys::wbft_extra(height), &bytes)?;
        Ok(())
    }

    fn save_epoch(&self, info: &EpochInfo) -> Result<(), IndexError> {
        let bytes = encode(info)?;
        self.kv.put(&keys::wbft_epoch(info.epoch), &bytes)?;
        Ok(())
    }

    fn save_signing(&self, activity: &[SigningActivity]) -> Result<(), IndexError> {
        for record in activity {
            let bytes = encode(record)?;
            self.kv.put(&keys::wbft_signing(record), &bytes)?;
        }
        Ok(())
    }

    fn block_extra(&self, height: u64) -> Result<Option<WbftExtra>, IndexError> {
        match self.kv.get(&keys::wbft_extra(height))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn epoch(&self, epoch: u64) -> Result<Option<EpochInfo>, IndexError> {
        match self.kv.get(&keys::wbft_epoch(epoch))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn signing_for_block(&self, height: u64) -> Result<Vec<SigningActivity>, IndexError> {
        self.collect_values(&keys::wbft_signing_prefix(height))
    }
}

impl FeeDelegationWriter for ChainIndex {
    fn save_fee_delegation(&self, meta: &FeeDelegation) -> Result<(), IndexError> {
        let bytes = encode(meta)?;
        self.kv.put(&keys::fee_delegation(&meta.tx_hash), &bytes)?;
        Ok(())
    }

    fn fee_delegation(&self, tx_hash: &Hash) -> Result<Option<FeeDelegation>, IndexError> {
        match self.kv.get(&keys::fee_delegation(tx_hash))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
