//! Byzantine evidence delivered by the consensus engine each block.

use serde::{Deserialize, Serialize};
use shared_types::NodeAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvidenceKind {
    DuplicateVote,
    LightClientAttack,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByzantineEvidence {
    /// Consensus address of the offending validator.
    pub validator: NodeAddress,
    pub height: u64,
    pub kind: EvidenceKind,
}
