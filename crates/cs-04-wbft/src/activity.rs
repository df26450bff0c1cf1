//! # Validator Signing Activity
//!
//! Intersects a block's prepare/commit seal bitmaps with the epoch's
//! candidate list to produce one activity record per (block, validator).

use crate::bitmap::decode_sealers;
use crate::extra::{Candidate, WbftExtra};
use serde::{Deserialize, Serialize};
use shared_types::Address;
use std::collections::HashSet;

/// One validator's signing record for one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningActivity {
    /// Block height.
    pub height: u64,
    /// Position within the epoch's candidate list.
    pub validator_index: u32,
    /// The validator's address.
    pub validator: Address,
    /// Signed the prepare phase.
    pub signed_prepare: bool,
    /// Signed the commit phase.
    pub signed_commit: bool,
    /// Round that sealed the block.
    pub round: u32,
}

/// Per-block consensus summary alongside the individual records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConsensus {
    /// Block height.
    pub height: u64,
    /// Round that sealed the block.
    pub round: u32,
    /// Validators that signed prepare.
    pub prepared_count: usize,
    /// Validators that signed commit.
    pub committed_count: usize,
    /// Candidate list size.
    pub validator_count: usize,
    /// Per-validator records.
    pub activity: Vec<SigningActivity>,
}

/// Derive signing activity for a block from its parsed extra and the
/// governing epoch's candidate list.
///
/// Candidates absent from both bitmaps still get a record (with both flags
/// false) so per-validator diligence queries see every block.
#[must_use]
pub fn derive_signing_activity(
    height: u64,
    extra: &WbftExtra,
    candidates: &[Candidate],
) -> BlockConsensus {
    let n = candidates.len();
    let prepared: HashSet<usize> = extra
        .prepared
        .as_ref()
        .map(|seal| decode_sealers(&seal.bitmap, n).into_iter().collect())
        .unwrap_or_default();
    let committed: HashSet<usize> = extra
        .committed
        .as_ref()
        .map(|seal| decode_sealers(&seal.bitmap, n).into_iter().collect())
        .unwrap_or_default();

    let activity = candidates
        .iter()
        .enumerate()
        .map(|(i, candidate)| SigningActivity {
            height,
            validator_index: i as u32,
            validator: candidate.address,
            signed_prepare: prepared.contains(&i),
            signed_commit: committed.contains(&i),
            round: extra.round,
        })
        .collect();

    BlockConsensus {
        height,
        round: extra.round,
        prepared_count: prepared.len(),
        committed_count: committed.len(),
        validator_count: n,
        activity,
    }
}

impl BlockConsensus {
    /// Committed participation as an integer percentage of the set.
    #[must_use]
    pub fn participation_percent(&self) -> u32 {
        if self.validator_count == 0 {
            return 0;
        }
        ((self.committed_count * 100) / self.validator_count) as u32
    }
}
