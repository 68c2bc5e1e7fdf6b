//! Node accounts: bonded validators that co-sign vaults.

use serde::{Deserialize, Serialize};
use shared_types::{NodeAddress, PubKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    Whitelisted,
    Standby,
    Ready,
    Active,
    Disabled,
}

/// Jail state; a jailed node is excluded from new ceremonies until release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jail {
    pub release_height: u64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAccount {
    pub node_address: NodeAddress,
    pub status: NodeStatus,
    /// Staked collateral in RUNE base units.
    pub bond: u128,
    /// secp256k1 key used in threshold ceremonies.
    pub signer_pub_key: PubKey,
    /// Address the consensus engine reports in byzantine evidence.
    pub validator_cons_address: NodeAddress,
    pub active_block_height: u64,
    /// Vaults this node holds a key share for.
    pub signer_membership: Vec<PubKey>,
    pub jail: Option<Jail>,
    pub requested_to_leave: bool,
    pub forced_to_leave: bool,
    pub leave_score: u64,
}

impl NodeAccount {
    pub fn new(
        node_address: NodeAddress,
        status: NodeStatus,
        signer_pub_key: PubKey,
        bond: u128,
    ) -> Self {
        Self {
            node_address,
            status,
            bond,
            signer_pub_key,
            validator_cons_address: node_address,
            active_block_height: 0,
            signer_membership: Vec::new(),
            jail: None,
            requested_to_leave: false,
            forced_to_leave: false,
            leave_score: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == NodeStatus::Active
    }

    /// Record membership of vault `pk`; no-op if already recorded.
    pub fn try_add_signer_pub_key(&mut self, pk: PubKey) {
        if !self.signer_membership.contains(&pk) {
            self.signer_membership.push(pk);
        }
    }

    pub fn is_jailed(&self, height: u64) -> bool {
        self.jail
            .as_ref()
            .is_some_and(|j| j.release_height > height)
    }

    /// Jail until `release_height`; an existing later release is kept.
    pub fn jail_until(&mut self, release_height: u64, reason: &str) {
        let release_height = match &self.jail {
            Some(j) if j.release_height > release_height => j.release_height,
            _ => release_height,
        };
        self.jail = Some(Jail {
            release_height,
            reason: reason.to_string(),
        });
    }

    /// Release at `height`, clearing any later release.
    pub fn release(&mut self, height: u64) {
        if let Some(j) = self.jail.as_mut() {
            j.release_height = height;
        }
    }

    pub fn force_leave(&mut self) {
        self.forced_to_leave = true;
        self.leave_score = 1;
    }

    /// Remove up to `amount` from the bond, returning what was actually taken.
    pub fn slash_bond(&mut self, amount: u128) -> u128 {
        let taken = amount.min(self.bond);
        self.bond -= taken;
        taken
    }
}
