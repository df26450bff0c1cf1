//! # Local Node Driver
//!
//! An in-process simulated EVM node backing the end-to-end scenarios.
//! Serves a deterministic generated chain, optionally with WBFT header
//! extras, and supports scripted fetch failures, tip advancement, and
//! pending-transaction injection.

use async_trait::async_trait;
use cs_01_node_client::{FeeDelegationSource, NodeClient, PendingTxSource, RpcError};
use cs_04_wbft::{encode_sealers, Candidate, EpochInfo, Seal, WbftExtra};
use ethereum_types::U256;
use parking_lot::{Mutex, RwLock};
use shared_types::{Address, Block, FeeDelegation, Hash, Log, Receipt, Transaction};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::mpsc;

use cs_03_chain_index::erc20_transfer_signature;

/// Baseline balance the node reports for every address.
pub const BASELINE_BALANCE: u64 = 1_000_000_000;

/// Shape of the generated chain.
#[derive(Debug, Clone)]
pub struct LocalNodeConfig {
    /// Transactions per block.
    pub txs_per_block: usize,
    /// Attach WBFT extras to every header.
    pub wbft: bool,
    /// Candidate-list size for the epoch carried by block 0.
    pub validators: usize,
    /// Per-height consensus round override (default round 0).
    pub round_overrides: HashMap<u64, u32>,
    /// Per-height committed-signer override (default: everyone signs).
    pub committed_overrides: HashMap<u64, Vec<usize>>,
    /// Make the first transaction of every block fee-delegated.
    pub fee_delegated: bool,
}

impl Default for LocalNodeConfig {
    fn default() -> Self {
        Self {
            txs_per_block: 2,
            wbft: false,
            validators: 4,
            round_overrides: HashMap::new(),
            committed_overrides: HashMap::new(),
            fee_delegated: false,
        }
    }
}

/// The in-process simulated node.
pub struct LocalNode {
    config: RwLock<LocalNodeConfig>,
    tip: AtomicU64,
    fail_remaining: AtomicU32,
    pending: Mutex<HashMap<Hash, Transaction>>,
    pending_subscribers: Mutex<Vec<mpsc::Sender<Hash>>>,
}

impl LocalNode {
    /// A node at `tip` with the given transactions per block.
    #[must_use]
    pub fn new(tip: u64, txs_per_block: usize) -> Self {
        Self::with_config(
            tip,
            LocalNodeConfig {
                txs_per_block,
                ..LocalNodeConfig::default()
            },
        )
    }

    /// A node with full control over the chain shape.
    #[must_use]
    pub fn with_config(tip: u64, config: LocalNodeConfig) -> Self {
        Self {
            config: RwLock::new(config),
            tip: AtomicU64::new(tip),
            fail_remaining: AtomicU32::new(0),
            pending: Mutex::new(HashMap::new()),
            pending_subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Fail the next `n` block fetches with a transport error.
    pub fn fail_next(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Move the chain tip forward.
    pub fn advance_tip(&self, by: u64) {
        self.tip.fetch_add(by, Ordering::SeqCst);
    }

    /// Current tip.
    #[must_use]
    pub fn tip(&self) -> u64 {
        self.tip.load(Ordering::SeqCst)
    }

    /// Inject a pending transaction and notify subscribers.
    pub fn inject_pending(&self, tx: Transaction) {
        let hash = tx.hash;
        self.pending.lock().insert(hash, tx);
        let subscribers = self.pending_subscribers.lock();
        for sender in subscribers.iter() {
            let _ = sender.try_send(hash);
        }
    }

    /// Deterministic address of validator `i`.
    #[must_use]
    pub fn validator_address(i: usize) -> Address {
        Address::repeat_byte(0xd0 + i as u8)
    }

    /// Deterministic hash of transaction `index` in block `height`.
    #[must_use]
    pub fn tx_hash(height: u64, index: usize) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&height.to_be_bytes());
        bytes[8..16].copy_from_slice(&(index as u64).to_be_bytes());
        bytes[31] = 0x77;
        Hash::from(bytes)
    }

    fn sender_of(height: u64, index: usize) -> Address {
        Address::repeat_byte(0x10 + ((height as u8).wrapping_add(index as u8) % 4))
    }

    fn contract_of(height: u64, index: usize) -> Address {
        let mut bytes = [0u8; 20];
        bytes[..8].copy_from_slice(&height.to_be_bytes());
        bytes[19] = index as u8;
        Address::from(bytes)
    }

    fn wbft_extra_at(&self, height: u64) -> Vec<u8> {
        let config = self.config.read();
        let n = config.validators;
        let round = config.round_overrides.get(&height).copied().unwrap_or(0);
        let all: Vec<usize> = (0..n).collect();
        let committed = config
            .committed_overrides
            .get(&height)
            .cloned()
            .unwrap_or_else(|| all.clone());

        let seal = |signers: &[usize]| Seal {
            bitmap: encode_sealers(signers, n),
            signature: vec![0x55; 96],
        };

        let epoch_info = (height == 0).then(|| EpochInfo {
            epoch: 0,
            candidates: (0..n)
                .map(|i| Candidate {
                    address: Self::validator_address(i),
                    diligence: 100,
                })
                .collect(),
            validator_indices: (0..n as u64).collect(),
            bls_public_keys: vec![vec![0x01; 48]; n],
        });

        WbftExtra {
            vanity: [0u8; 32],
            randao_reveal: vec![0xaa; 32],
            prev_round: 0,
            prev_prepared: None,
            prev_committed: None,
            round,
            prepared: Some(seal(&all)),
            committed: Some(seal(&committed)),
            gas_tip: U256::zero(),
            epoch_info,
            bls_seal: vec![0x99; 96],
        }
        .encode()
    }

    /// The generated block at `height`.
    #[must_use]
    pub fn block_at(&self, height: u64) -> Block {
        let config = self.config.read();
        let txs_per_block = config.txs_per_block;
        let wbft = config.wbft;
        let fee_delegated = config.fee_delegated;
        drop(config);

        let transactions: Vec<Transaction> = (0..txs_per_block)
            .map(|i| {
                // The second transaction of every block is a contract
                // creation; the rest are simple transfers.
                let is_creation = i == 1;
                Transaction {
                    hash: Self::tx_hash(height, i),
                    from: Self::sender_of(height, i),
                    to: (!is_creation).then(|| Address::repeat_byte(0x02)),
                    value: U256::from(100u64 + height),
                    gas: 21_000,
                    gas_price: U256::from(1u64),
                    input: Vec::new(),
                    nonce: height,
                    tx_type: if fee_delegated && i == 0 {
                        shared_types::TX_TYPE_FEE_DELEGATED
                    } else {
                        0
                    },
                    index: i as u32,
                }
            })
            .collect();

        Block {
            number: height,
            hash: Hash::from_low_u64_be(height + 1_000_000),
            parent_hash: Hash::from_low_u64_be(height + 999_999),
            miner: Address::repeat_byte(0xee),
            gas_used: 21_000 * txs_per_block as u64,
            gas_limit: 30_000_000,
            timestamp: 1_700_000_000 + height,
            extra_data: if wbft {
                self.wbft_extra_at(height)
            } else {
                Vec::new()
            },
            transactions,
        }
    }

    /// The generated receipts of block `height`.
    #[must_use]
    pub fn receipts_at(&self, height: u64) -> Vec<Receipt> {
        let block = self.block_at(height);
        block
            .transactions
            .iter()
            .enumerate()
            .map(|(i, tx)| {
                let contract_address =
                    tx.to.is_none().then(|| Self::contract_of(height, i));

                // The first transaction emits an ERC-20 transfer log.
                let logs = if i == 0 {
                    let topic_of = |address: Address| {
                        let mut bytes = [0u8; 32];
                        bytes[12..].copy_from_slice(address.as_bytes());
                        Hash::from(bytes)
                    };
                    let mut data = vec![0u8; 32];
                    data[24..].copy_from_slice(&(height + 1).to_be_bytes());
                    vec![Log {
                        address: Address::repeat_byte(0xcc),
                        topics: vec![
                            erc20_transfer_signature(),
                            topic_of(tx.from),
                            topic_of(Address::repeat_byte(0x02)),
                        ],
                        data,
                        block_number: height,
                        tx_hash: tx.hash,
                        log_index: 0,
                    }]
                } else {
                    Vec::new()
                };

                Receipt {
                    tx_hash: tx.hash,
                    block_number: height,
                    status: true,
                    gas_used: 21_000,
                    cumulative_gas_used: 21_000 * (i as u64 + 1),
                    contract_address,
                    logs,
                    effective_gas_price: tx.gas_price,
                }
            })
            .collect()
    }
}

#[async_trait]
impl NodeClient for LocalNode {
    async fn latest_block_number(&self) -> Result<u64, RpcError> {
        Ok(self.tip())
    }

    async fn block_by_number(&self, number: u64) -> Result<Block, RpcError> {
        if self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RpcError::Transport("scripted failure".into()));
        }
        if number > self.tip() {
            return Err(RpcError::NotFound(format!("block {number}")));
        }
        Ok(self.block_at(number))
    }

    async fn block_receipts(&self, number: u64) -> Result<Vec<Receipt>, RpcError> {
        if number > self.tip() {
            return Err(RpcError::NotFound(format!("receipts {number}")));
        }
        Ok(self.receipts_at(number))
    }

    async fn transaction_by_hash(&self, hash: Hash) -> Result<Transaction, RpcError> {
        if let Some(tx) = self.pending.lock().get(&hash) {
            return Ok(tx.clone());
        }
        for height in 0..=self.tip() {
            let block = self.block_at(height);
            if let Some(tx) = block.transactions.iter().find(|tx| tx.hash == hash) {
                return Ok(tx.clone());
            }
        }
        Err(RpcError::NotFound(format!("tx {hash:?}")))
    }

    async fn balance_at(&self, _address: Address, _height: u64) -> Result<U256, RpcError> {
        Ok(U256::from(BASELINE_BALANCE))
    }

    async fn chain_id(&self) -> Result<u64, RpcError> {
        Ok(1111)
    }

    async fn client_version(&self) -> Result<String, RpcError> {
        Ok("Wemix/v0.10.1-local/linux-amd64".to_string())
    }
}

impl PendingTxSource for LocalNode {
    fn subscribe_pending_txs(&self) -> mpsc::Receiver<Hash> {
        let (tx, rx) = mpsc::channel(64);
        self.pending_subscribers.lock().push(tx);
        rx
    }
}

#[async_trait]
impl FeeDelegationSource for LocalNode {
    async fn fee_delegation_meta(&self, number: u64) -> Result<Vec<FeeDelegation>, RpcError> {
        let block = self.block_at(number);
        Ok(block
            .transactions
            .iter()
            .filter(|tx| tx.is_fee_delegated())
            .map(|tx| FeeDelegation {
                tx_hash: tx.hash,
                original_type: 0,
                fee_payer: Address::repeat_byte(0xfe),
                sig_v: 27,
                sig_r: Hash::repeat_byte(0x0a),
                sig_s: Hash::repeat_byte(0x0b),
            })
            .collect())
    }
}
