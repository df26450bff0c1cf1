//! # HTTP JSON-RPC Client
//!
//! Production [`NodeClient`] over HTTP. One POST per call with a
//! per-request timeout; request ids are monotonic per client instance.

use crate::client::NodeClient;
use crate::error::RpcError;
use crate::rpc_types::{RpcBlock, RpcReceipt, RpcTransaction};
use async_trait::async_trait;
use ethereum_types::U256;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use shared_types::quantity::{format_u64, parse_u256, parse_u64};
use shared_types::{Address, Block, Hash, Receipt, Transaction};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Default per-call timeout.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC implementation of [`NodeClient`].
pub struct HttpNodeClient {
    client: reqwest::Client,
    endpoint: String,
    request_id: AtomicU64,
}

impl HttpNodeClient {
    /// Build a client for the given endpoint with the default timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, RpcError> {
        Self::with_timeout(endpoint, DEFAULT_RPC_TIMEOUT)
    }

    /// Build a client with an explicit per-call timeout.
    pub fn with_timeout(
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            request_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        debug!(method, id, "RPC call");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Timeout
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status(status.as_u16()));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| RpcError::Decode(e.to_string()))?;

        if let Some(err) = envelope.error {
            return Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        envelope
            .result
            .ok_or_else(|| RpcError::NotFound(format!("{method} returned null")))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        let hex: String = self.call("eth_blockNumber", json!([])).await?;
        Ok(parse_u64(&hex)?)
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        let rpc: Option<RpcBlock> = self
            .call("eth_getBlockByNumber", json!([format_u64(number), true]))
            .await?;
        let rpc = rpc.ok_or_else(|| RpcError::NotFound(format!("block {number}")))?;
        rpc.try_into()
    }

    async fn block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RpcError> {
        let rpc: Option<Vec<RpcReceipt>> = self
            .call("eth_getBlockReceipts", json!([format_u64(number)]))
            .await?;
        let rpc = rpc.ok_or_else(|| RpcError::NotFound(format!("receipts for block {number}")))?;
        rpc.into_iter().map(TryInto::try_into).collect()
    }

    async fn transaction_by_hash(&self, hash: Hash) -> Result<Transaction, RpcError> {
        let rpc: Option<RpcTransaction> = self
            .call("eth_getTransactionByHash", json!([hash]))
            .await?;
        let rpc = rpc.ok_or_else(|| RpcError::NotFound(format!("tx {hash:?}")))?;
        rpc.try_into()
    }

    async fn balance_at(&self, address: Address, height: u64) -> Result<U256, RpcError> {
        let hex: String = self
            .call("eth_getBalance", json!([address, format_u64(height)]))
            .await?;
        Ok(parse_u256(&hex)?)
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        let hex: String = self.call("eth_chainId", json!([])).await?;
        Ok(parse_u64(&hex)?)
    }

    async fn client_version(&self) -> Result<String, RpcError> {
        self.call("web3_clientVersion", json!([])).await
    }
}
