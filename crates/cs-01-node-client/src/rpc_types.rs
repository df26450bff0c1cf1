//! # JSON-RPC Wire Types
//!
//! The camelCase shapes EVM nodes return, converted into the shared chain
//! entities at the client boundary. Quantities arrive as `0x…` hex strings
//! and are parsed strictly; a malformed field is a decode error for the
//! whole entity.

use crate::error::RpcError;
use ethereum_types::{H160, H256};
use serde::Deserialize;
use shared_types::quantity::{parse_bytes, parse_u256, parse_u64};
use shared_types::{Block, Log, Receipt, Transaction};

impl From<shared_types::QuantityError> for RpcError {
    fn from(err: shared_types::QuantityError) -> Self {
        Self::Decode(err.to_string())
    }
}

/// A block as returned by `eth_getBlockByNumber` with full transactions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    pub number: String,
    pub hash: H256,
    pub parent_hash: H256,
    pub miner: H160,
    pub gas_used: String,
    pub gas_limit: String,
    pub timestamp: String,
    pub extra_data: String,
    #[serde(default)]
    pub transactions: Vec<RpcTransaction>,
}

/// A transaction as embedded in a block response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: H256,
    pub from: H160,
    pub to: Option<H160>,
    pub value: String,
    pub gas: String,
    #[serde(default)]
    pub gas_price: Option<String>,
    pub input: String,
    pub nonce: String,
    #[serde(default)]
    pub transaction_index: Option<String>,
    #[serde(rename = "type", default)]
    pub tx_type: Option<String>,
}

/// A receipt as returned by `eth_getBlockReceipts`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    pub block_number: String,
    #[serde(default)]
    pub status: Option<String>,
    pub gas_used: String,
    pub cumulative_gas_used: String,
    #[serde(default)]
    pub contract_address: Option<H160>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
    #[serde(default)]
    pub effective_gas_price: Option<String>,
}

/// A log entry within a receipt.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: H160,
    #[serde(default)]
    pub topics: Vec<H256>,
    pub data: String,
    #[serde(default)]
    pub block_number: Option<String>,
    pub transaction_hash: H256,
    #[serde(default)]
    pub log_index: Option<String>,
}

impl TryFrom<RpcBlock> for Block {
    type Error = RpcError;

    fn try_from(rpc: RpcBlock) -> Result<Self, Self::Error> {
        let transactions = rpc
            .transactions
            .into_iter()
            .enumerate()
            .map(|(i, tx)| convert_transaction(tx, i as u32))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            number: parse_u64(&rpc.number)?,
            hash: rpc.hash,
            parent_hash: rpc.parent_hash,
            miner: rpc.miner,
            gas_used: parse_u64(&rpc.gas_used)?,
            gas_limit: parse_u64(&rpc.gas_limit)?,
            timestamp: parse_u64(&rpc.timestamp)?,
            extra_data: parse_bytes(&rpc.extra_data)?,
            transactions,
        })
    }
}

fn convert_transaction(rpc: RpcTransaction, fallback_index: u32) -> Result<Transaction, RpcError> {
    let index = match &rpc.transaction_index {
        Some(s) => parse_u64(s)? as u32,
        None => fallback_index,
    };
    let tx_type = match &rpc.tx_type {
        Some(s) => parse_u64(s)? as u8,
        None => 0,
    };
    let gas_price = match &rpc.gas_price {
        Some(s) => parse_u256(s)?,
        None => Default::default(),
    };

    Ok(Transaction {
        hash: rpc.hash,
        from: rpc.from,
        to: rpc.to,
        value: parse_u256(&rpc.value)?,
        gas: parse_u64(&rpc.gas)?,
        gas_price,
        input: parse_bytes(&rpc.input)?,
        nonce: parse_u64(&rpc.nonce)?,
        tx_type,
        index,
    })
}

impl TryFrom<RpcTransaction> for Transaction {
    type Error = RpcError;

    fn try_from(rpc: RpcTransaction) -> Result<Self, Self::Error> {
        convert_transaction(rpc, 0)
    }
}

impl TryFrom<RpcReceipt> for Receipt {
    type Error = RpcError;

    fn try_from(rpc: RpcReceipt) -> Result<Self, Self::Error> {
        let block_number = parse_u64(&rpc.block_number)?;
        let logs = rpc
            .logs
            .into_iter()
            .map(|log| convert_log(log, block_number))
            .collect::<Result<Vec<_>, _>>()?;

        // Pre-Byzantium receipts omit status; treat absence as success.
        let status = match &rpc.status {
            Some(s) => parse_u64(s)? == 1,
            None => true,
        };
        let effective_gas_price = match &rpc.effective_gas_price {
            Some(s) => parse_u256(s)?,
            None => Default::default(),
        };

        Ok(Self {
            tx_hash: rpc.transaction_hash,
            block_number,
            status,
            gas_used: parse_u64(&rpc.gas_used)?,
            cumulative_gas_used: parse_u64(&rpc.cumulative_gas_used)?,
            contract_address: rpc.contract_address,
            logs,
            effective_gas_price,
        })
    }
}

fn convert_log(rpc: RpcLog, block_number: u64) -> Result<Log, RpcError> {
    let log_index = match &rpc.log_index {
        Some(s) => parse_u64(s)? as u32,
        None => 0,
    };
    let block_number = match &rpc.block_number {
        Some(s) => parse_u64(s)?,
        None => block_number,
    };

    Ok(Log {
        address: rpc.address,
        topics: rpc.topics,
        data: parse_bytes(&rpc.data)?,
        block_number,
        tx_hash: rpc.transaction_hash,
        log_index,
    })
}
