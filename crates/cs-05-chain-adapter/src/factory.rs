//! # Node Detection Factory
//!
//! Classifies the connected node from `web3_clientVersion` (a freeform
//! string, matched fuzzily) and `eth_chainId`, and builds the matching
//! adapter. Unknown nodes get the generic adapter.

use crate::adapter::{ChainAdapter, ConsensusKind, GenericAdapter, WbftAdapter};
use cs_01_node_client::{NodeClient, RpcError};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Chain ids known to run WBFT consensus.
const WBFT_CHAIN_IDS: &[u64] = &[1111, 1112];

/// Fuzzy-classify a client-version string.
///
/// Substring match, case-insensitive; the version string is freeform and
/// node operators prepend arbitrary build tags.
#[must_use]
pub fn classify_client_version(version: &str) -> ConsensusKind {
    let lower = version.to_ascii_lowercase();
    if lower.contains("wbft") || lower.contains("wemix") {
        ConsensusKind::Wbft
    } else {
        ConsensusKind::Unknown
    }
}

fn short_name(version: &str) -> String {
    version
        .split('/')
        .next()
        .unwrap_or("unknown")
        .to_ascii_lowercase()
}

/// Probe the node and build the matching adapter.
///
/// Both probe calls are bounded by `timeout`; a slow or unreachable node
/// surfaces as [`RpcError::Timeout`].
pub async fn detect(
    client: &dyn NodeClient,
    timeout: Duration,
) -> Result<Arc<dyn ChainAdapter>, RpcError> {
    let version = tokio::time::timeout(timeout, client.client_version())
        .await
        .map_err(|_| RpcError::Timeout)??;
    let chain_id = tokio::time::timeout(timeout, client.chain_id())
        .await
        .map_err(|_| RpcError::Timeout)??;

    let kind = match classify_client_version(&version) {
        ConsensusKind::Unknown if WBFT_CHAIN_IDS.contains(&chain_id) => ConsensusKind::Wbft,
        kind => kind,
    };

    let name = short_name(&version);
    info!(
        client_version = %version,
        chain_id,
        kind = ?kind,
        "Detected node"
    );

    Ok(match kind {
        ConsensusKind::Wbft => Arc::new(WbftAdapter::new(name, chain_id)),
        ConsensusKind::Unknown => Arc::new(GenericAdapter::new(name, chain_id)),
    })
}
