//! Key generation requests.
//!
//! The churn orchestrator records one [`KeygenBlock`] per height listing the
//! ceremonies the off-chain signers must run. Each ceremony id commits to the
//! height, type and sorted member set, so the same request is never recorded
//! twice.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use shared_types::PubKey;

#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CeremonyId(#[serde_as(as = "Bytes")] pub [u8; 32]);

impl fmt::Display for CeremonyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeygenType {
    Asgard,
    Yggdrasil,
}

impl KeygenType {
    fn tag(&self) -> u8 {
        match self {
            KeygenType::Asgard => 0,
            KeygenType::Yggdrasil => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keygen {
    pub id: CeremonyId,
    pub keygen_type: KeygenType,
    /// Sorted, deduplicated.
    pub members: Vec<PubKey>,
}

impl Keygen {
    pub fn new(height: u64, members: Vec<PubKey>, keygen_type: KeygenType) -> Self {
        let mut members = members;
        members.sort();
        members.dedup();
        let id = ceremony_id(height, keygen_type, &members);
        Self {
            id,
            keygen_type,
            members,
        }
    }

    pub fn contains(&self, pk: &PubKey) -> bool {
        self.members.binary_search(pk).is_ok()
    }
}

/// `sha256(height || type || members)`; `members` must already be sorted.
pub fn ceremony_id(height: u64, keygen_type: KeygenType, members: &[PubKey]) -> CeremonyId {
    let mut hasher = Sha256::new();
    hasher.update(height.to_be_bytes());
    hasher.update([keygen_type.tag()]);
    for m in members {
        hasher.update(m.0);
    }
    CeremonyId(hasher.finalize().into())
}

/// Keygen ceremonies requested at a single height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeygenBlock {
    pub height: u64,
    pub keygens: Vec<Keygen>,
}

impl KeygenBlock {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            keygens: Vec::new(),
        }
    }

    pub fn contains(&self, keygen: &Keygen) -> bool {
        self.keygens.iter().any(|k| k.id == keygen.id)
    }

    pub fn is_empty(&self) -> bool {
        self.keygens.is_empty()
    }

    /// True if `pk` is expected in a ceremony of `keygen_type`.
    pub fn has_member(&self, pk: &PubKey, keygen_type: KeygenType) -> bool {
        self.keygens
            .iter()
            .any(|k| k.keygen_type == keygen_type && k.contains(pk))
    }
}
