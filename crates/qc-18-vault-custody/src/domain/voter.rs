//! # Ceremony Voting
//!
//! Threshold ceremonies run off-chain; each participant reports the outcome
//! it observed and the chain records it once enough reports agree.
//!
//! [`ConsensusVoter`] is the generic tally: one payload per signer, consensus
//! when a ratio of the eligible set reported the same payload. The tally is a
//! map keyed by signer so any submission order yields the same state.
//!
//! - [`KeygenVoter`]: keygen outcomes. The resulting pool key is locked on
//!   first sight; a later report with a different key is rejected.
//! - [`KeysignFailVoter`]: blame for a failed signing attempt. Reset after
//!   each consensus so a repeated failure gathers a fresh round.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared_types::{Chain, Coin, PubKey};

use super::keygen::{CeremonyId, KeygenType};
use super::majority::Ratio;
use crate::error::{CustodyError, CustodyResult};

/// Round label reported when a keysign fails in its final round.
pub const KEYSIGN_ROUND_7: &str = "SignRound7Message";

/// Generic per-signer vote tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusVoter<P> {
    votes: BTreeMap<PubKey, P>,
}

impl<P> Default for ConsensusVoter<P> {
    fn default() -> Self {
        Self {
            votes: BTreeMap::new(),
        }
    }
}

impl<P: Clone + PartialEq> ConsensusVoter<P> {
    /// Record `payload` for `signer`. Returns false if the signer already voted.
    pub fn sign(&mut self, signer: PubKey, payload: P) -> bool {
        if self.votes.contains_key(&signer) {
            return false;
        }
        self.votes.insert(signer, payload);
        true
    }

    pub fn has_signed(&self, signer: &PubKey) -> bool {
        self.votes.contains_key(signer)
    }

    pub fn signers(&self) -> impl Iterator<Item = &PubKey> {
        self.votes.keys()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn votes(&self) -> impl Iterator<Item = (&PubKey, &P)> {
        self.votes.iter()
    }

    /// Eligible signers that voted for `payload`.
    pub fn tally(&self, payload: &P, eligible: &[PubKey]) -> usize {
        eligible
            .iter()
            .filter(|pk| self.votes.get(pk) == Some(payload))
            .count()
    }

    /// The payload that `ratio` of `eligible` agreed on, if any.
    pub fn consensus_payload(&self, eligible: &[PubKey], ratio: Ratio) -> Option<P> {
        let mut seen: Vec<&P> = Vec::new();
        for pk in eligible {
            let Some(payload) = self.votes.get(pk) else {
                continue;
            };
            if seen.contains(&payload) {
                continue;
            }
            if ratio.is_met(self.tally(payload, eligible), eligible.len()) {
                return Some(payload.clone());
            }
            seen.push(payload);
        }
        None
    }

    pub fn has_consensus(&self, eligible: &[PubKey], ratio: Ratio) -> bool {
        self.consensus_payload(eligible, ratio).is_some()
    }

    /// Every eligible member voted, and all for the same payload.
    pub fn has_complete_consensus(&self, eligible: &[PubKey]) -> bool {
        let Some(first) = eligible.first().and_then(|pk| self.votes.get(pk)) else {
            return false;
        };
        self.tally(first, eligible) == eligible.len()
    }

    pub fn reset(&mut self) {
        self.votes.clear();
    }
}

// =============================================================================
// KEYGEN
// =============================================================================

/// What a participant reports after a keygen ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeygenOutcome {
    Success { pool_pub_key: PubKey },
    /// Ceremony failed; `blame` names the members held responsible.
    Failure { blame: Vec<PubKey> },
}

impl KeygenOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, KeygenOutcome::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenVoter {
    pub id: CeremonyId,
    /// Height the ceremony was requested at.
    pub height: u64,
    pub keygen_type: KeygenType,
    pub members: Vec<PubKey>,
    /// Locked on the first successful report.
    pub pool_pub_key: Option<PubKey>,
    /// Chains each signer reported support for.
    pub chains: BTreeMap<PubKey, Vec<Chain>>,
    pub votes: ConsensusVoter<KeygenOutcome>,
    /// First height a supermajority agreed.
    pub majority_consensus_height: Option<u64>,
    /// Height the outcome was applied.
    pub block_height: Option<u64>,
}

impl KeygenVoter {
    pub fn new(id: CeremonyId, height: u64, keygen_type: KeygenType, members: Vec<PubKey>) -> Self {
        let mut members = members;
        members.sort();
        members.dedup();
        Self {
            id,
            height,
            keygen_type,
            members,
            pool_pub_key: None,
            chains: BTreeMap::new(),
            votes: ConsensusVoter::default(),
            majority_consensus_height: None,
            block_height: None,
        }
    }

    /// Record a participant's report.
    ///
    /// Returns `Ok(false)` for non-members and repeat signers. A success
    /// report naming a different pool key than the locked one is an error and
    /// leaves the voter untouched.
    pub fn sign(
        &mut self,
        signer: PubKey,
        outcome: KeygenOutcome,
        chains: Vec<Chain>,
    ) -> CustodyResult<bool> {
        if !self.members.contains(&signer) {
            return Ok(false);
        }
        let submitted = match &outcome {
            KeygenOutcome::Success { pool_pub_key } => Some(*pool_pub_key),
            KeygenOutcome::Failure { .. } => None,
        };
        if let (Some(recorded), Some(submitted)) = (self.pool_pub_key, submitted) {
            if recorded != submitted {
                return Err(CustodyError::ResultMismatch {
                    recorded: recorded.to_string(),
                    submitted: submitted.to_string(),
                });
            }
        }
        if !self.votes.sign(signer, outcome) {
            return Ok(false);
        }
        if self.pool_pub_key.is_none() {
            self.pool_pub_key = submitted;
        }
        self.chains.insert(signer, chains);
        Ok(true)
    }

    pub fn consensus(&self, ratio: Ratio) -> Option<KeygenOutcome> {
        self.votes.consensus_payload(&self.members, ratio)
    }

    /// Whether some member has not reported at all.
    pub fn awaiting_reports(&self) -> bool {
        self.members.iter().any(|m| !self.votes.has_signed(m))
    }

    /// Members that voted for `outcome`.
    pub fn signers_for(&self, outcome: &KeygenOutcome) -> Vec<PubKey> {
        self.votes
            .votes()
            .filter(|(_, p)| *p == outcome)
            .map(|(pk, _)| *pk)
            .collect()
    }

    /// Chains that `ratio` of the members reported support for.
    pub fn consensus_chains(&self, ratio: Ratio) -> Vec<Chain> {
        let mut counts: BTreeMap<Chain, usize> = BTreeMap::new();
        for chains in self.chains.values() {
            let mut chains = chains.clone();
            chains.sort();
            chains.dedup();
            for chain in chains {
                *counts.entry(chain).or_default() += 1;
            }
        }
        counts
            .into_iter()
            .filter(|(_, n)| ratio.is_met(*n, self.members.len()))
            .map(|(c, _)| c)
            .collect()
    }
}

// =============================================================================
// KEYSIGN FAILURE
// =============================================================================

/// An accusation reported after a failed signing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blame {
    pub fail_reason: String,
    pub round: String,
    pub nodes: Vec<PubKey>,
}

impl Blame {
    pub fn new(fail_reason: &str, round: &str, nodes: Vec<PubKey>) -> Self {
        let mut nodes = nodes;
        nodes.sort();
        nodes.dedup();
        Self {
            fail_reason: fail_reason.to_string(),
            round: round.to_string(),
            nodes,
        }
    }

    pub fn is_round_7(&self) -> bool {
        self.round == KEYSIGN_ROUND_7
    }
}

/// Identifies one outbound signing attempt.
pub fn keysign_attempt_id(vault: &PubKey, height: u64, memo: &str, coins: &[Coin]) -> CeremonyId {
    let mut hasher = Sha256::new();
    hasher.update(vault.0);
    hasher.update(height.to_be_bytes());
    hasher.update(memo.as_bytes());
    for coin in coins {
        hasher.update(coin.asset.to_string().as_bytes());
        hasher.update(coin.amount.to_be_bytes());
    }
    CeremonyId(hasher.finalize().into())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysignFailVoter {
    pub id: CeremonyId,
    pub votes: ConsensusVoter<Blame>,
    /// Final-round failures reported in the current round of reports.
    pub round7_count: u32,
}

impl KeysignFailVoter {
    pub fn new(id: CeremonyId) -> Self {
        Self {
            id,
            votes: ConsensusVoter::default(),
            round7_count: 0,
        }
    }

    pub fn sign(&mut self, signer: PubKey, blame: Blame) -> bool {
        let round7 = blame.is_round_7();
        if !self.votes.sign(signer, blame) {
            return false;
        }
        if round7 {
            self.round7_count += 1;
        }
        true
    }

    /// Whether the vault should be frozen for the agreed failure.
    ///
    /// More than one final-round report, or any final-round report from a
    /// signer set of two or fewer.
    pub fn should_freeze(&self) -> bool {
        self.round7_count > 1 || (self.round7_count > 0 && self.votes.len() <= 2)
    }

    /// Clear the tally so a repeated failure starts a fresh round.
    pub fn reset(&mut self) {
        self.votes.reset();
        self.round7_count = 0;
    }
}
