//! # Header Extra Decoding
//!
//! The consensus payload rides in the block header's extra-data field:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────────┐
//! │ 32-byte      │ RLP consensus payload        │ 96-byte      │
//! │ vanity       │ (rounds, seals, epoch info)  │ BLS seal     │
//! └──────────────┴──────────────────────────────┴──────────────┘
//! ```
//!
//! Optional positions in the payload (absent seals, non-boundary blocks
//! without epoch info) are encoded as empty RLP lists.

use crate::error::WbftError;
use ethereum_types::U256;
use rlp::{DecoderError, Rlp, RlpStream};
use serde::{Deserialize, Serialize};
use shared_types::Address;

/// Length of the vanity prefix.
pub const VANITY_LEN: usize = 32;

/// Length of the trailing aggregated BLS seal.
pub const BLS_SEAL_LEN: usize = 96;

/// Length of a per-phase seal signature.
pub const SEAL_SIG_LEN: usize = 96;

/// An aggregated phase seal: who signed, and the aggregate signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    /// Bitmap over the epoch's candidate list; bit *i* = candidate *i* signed.
    pub bitmap: Vec<u8>,
    /// 96-byte aggregated BLS signature.
    pub signature: Vec<u8>,
}

impl rlp::Encodable for Seal {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.bitmap);
        s.append(&self.signature);
    }
}

impl rlp::Decodable for Seal {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            bitmap: rlp.val_at(0)?,
            signature: rlp.val_at(1)?,
        })
    }
}

/// A candidate validator within an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate address.
    pub address: Address,
    /// Accumulated diligence score.
    pub diligence: u64,
}

impl rlp::Encodable for Candidate {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append(&self.diligence);
    }
}

impl rlp::Decodable for Candidate {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(Self {
            address: rlp.val_at(0)?,
            diligence: rlp.val_at(1)?,
        })
    }
}

/// Epoch boundary payload: the candidate list and validator selection.
///
/// Present only in the first block of an epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochInfo {
    /// Epoch number.
    pub epoch: u64,
    /// Ordered candidate list.
    pub candidates: Vec<Candidate>,
    /// Positions of active validators within `candidates`.
    pub validator_indices: Vec<u64>,
    /// BLS public keys, parallel to `validator_indices`.
    pub bls_public_keys: Vec<Vec<u8>>,
}

impl EpochInfo {
    /// Resolve the active validator addresses.
    ///
    /// Fails when an index points outside the candidate list.
    pub fn validators(&self) -> Result<Vec<Address>, WbftError> {
        self.validator_indices
            .iter()
            .map(|&i| {
                self.candidates
                    .get(i as usize)
                    .map(|c| c.address)
                    .ok_or(WbftError::BadValidatorIndex {
                        index: i,
                        candidates: self.candidates.len(),
                    })
            })
            .collect()
    }
}

impl rlp::Encodable for EpochInfo {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.epoch);
        s.begin_list(self.candidates.len());
        for candidate in &self.candidates {
            s.append(candidate);
        }
        s.append_list(&self.validator_indices);
        s.append_list::<Vec<u8>, _>(&self.bls_public_keys);
    }
}

impl rlp::Decodable for EpochInfo {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let candidates_rlp = rlp.at(1)?;
        let candidates = candidates_rlp
            .iter()
            .map(|item| Candidate::decode(&item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            epoch: rlp.val_at(0)?,
            candidates,
            validator_indices: rlp.list_at(2)?,
            bls_public_keys: rlp.list_at(3)?,
        })
    }
}

/// The fully parsed extra-data payload of one block header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WbftExtra {
    /// 32-byte vanity prefix.
    pub vanity: [u8; 32],
    /// Proposer randao reveal.
    pub randao_reveal: Vec<u8>,
    /// Round of the previous block referenced by the carried seals.
    pub prev_round: u32,
    /// Prepared seal for the previous block, when carried.
    pub prev_prepared: Option<Seal>,
    /// Committed seal for the previous block, when carried.
    pub prev_committed: Option<Seal>,
    /// Round that sealed this block.
    pub round: u32,
    /// Prepared seal for this block.
    pub prepared: Option<Seal>,
    /// Committed seal for this block.
    pub committed: Option<Seal>,
    /// Gas tip committed by consensus.
    pub gas_tip: U256,
    /// Epoch info, on epoch-boundary blocks only.
    pub epoch_info: Option<EpochInfo>,
    /// Trailing 96-byte aggregated BLS seal.
    pub bls_seal: Vec<u8>,
}

fn append_opt<T: rlp::Encodable>(s: &mut RlpStream, value: &Option<T>) {
    match value {
        Some(v) => {
            s.append(v);
        }
        None => {
            s.begin_list(0);
        }
    }
}

fn opt_at<T: rlp::Decodable>(rlp: &Rlp, index: usize) -> Result<Option<T>, DecoderError> {
    let item = rlp.at(index)?;
    if item.is_list() && item.item_count()? == 0 {
        Ok(None)
    } else {
        T::decode(&item).map(Some)
    }
}

impl WbftExtra {
    /// Parse a raw header extra-data field.
    pub fn decode(extra_data: &[u8]) -> Result<Self, WbftError> {
        let need = VANITY_LEN + BLS_SEAL_LEN;
        if extra_data.len() < need {
            return Err(WbftError::ExtraTooShort {
                got: extra_data.len(),
                need,
            });
        }

        let mut vanity = [0u8; VANITY_LEN];
        vanity.copy_from_slice(&extra_data[..VANITY_LEN]);
        let bls_seal = extra_data[extra_data.len() - BLS_SEAL_LEN..].to_vec();
        let payload = &extra_data[VANITY_LEN..extra_data.len() - BLS_SEAL_LEN];

        let rlp = Rlp::new(payload);
        Ok(Self {
            vanity,
            randao_reveal: rlp.val_at(0)?,
            prev_round: rlp.val_at(1)?,
            prev_prepared: opt_at(&rlp, 2)?,
            prev_committed: opt_at(&rlp, 3)?,
            round: rlp.val_at(4)?,
            prepared: opt_at(&rlp, 5)?,
            committed: opt_at(&rlp, 6)?,
            gas_tip: rlp.val_at(7)?,
            epoch_info: opt_at(&rlp, 8)?,
            bls_seal,
        })
    }

    /// Serialize back into a raw extra-data field.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut s = RlpStream::new_list(9);
        s.append(&self.randao_reveal);
        s.append(&self.prev_round);
        append_opt(&mut s, &self.prev_prepared);
        append_opt(&mut s, &self.prev_committed);
        s.append(&self.round);
        append_opt(&mut s, &self.prepared);
        append_opt(&mut s, &self.committed);
        s.append(&self.gas_tip);
        append_opt(&mut s, &self.epoch_info);

        let payload = s.out();
        let mut out = Vec::with_capacity(VANITY_LEN + payload.len() + BLS_SEAL_LEN);
        out.extend_from_slice(&self.vanity);
        out.extend_from_slice(&payload[..]);
        out.extend_from_slice(&self.bls_seal);
        out
    }
}
