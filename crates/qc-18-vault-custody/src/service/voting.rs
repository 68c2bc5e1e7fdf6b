//! Ceremony voting: keygen outcomes and keysign failures.
//!
//! Reports are tallied in the store-backed voters, so any submission order
//! converges on the same tally. Signers pay `observe_slash_points` up front
//! and get them back when their report lands in time.

use shared_types::{NodeAddress, PubKey};
use tracing::{error, info, warn};

use super::CustodyService;
use crate::domain::{
    has_simple_majority, keysign_attempt_id, Keygen, KeygenOutcome, KeygenType, KeygenVoter,
    KeysignFailVoter, NodeAccount, NodeStatus, Vault, VaultStatus, VaultType,
};
use crate::error::{CustodyError, CustodyResult};
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::inbound::{KeygenProgress, KeygenResultMsg, KeysignFailureMsg};

impl CustodyService {
    pub(crate) fn handle_keygen_result(
        &self,
        height: u64,
        msg: KeygenResultMsg,
    ) -> CustodyResult<KeygenProgress> {
        let retry = self.config().churn_retry_interval;
        if height.checked_sub(retry).is_some_and(|cutoff| msg.height <= cutoff) {
            return Err(CustodyError::StaleCeremony {
                ceremony_height: msg.height,
                current_height: height,
            });
        }

        let node = self.store.get_node_account(&msg.signer)?;
        let eligible = matches!(node.status, NodeStatus::Active | NodeStatus::Ready)
            && node.bond >= self.policy.minimum_bond();
        if !eligible {
            return Err(CustodyError::Unauthorized {
                signer: msg.signer.to_string(),
                reason: "not an active or ready bonded node".to_string(),
            });
        }

        let block = self
            .store
            .get_keygen_block(msg.height)?
            .ok_or(CustodyError::KeygenBlockNotFound { height: msg.height })?;
        let requested = Keygen::new(msg.height, msg.members, msg.keygen_type);
        let keygen = block
            .keygens
            .iter()
            .find(|k| k.id == requested.id && k.contains(&node.signer_pub_key))
            .ok_or_else(|| CustodyError::Unauthorized {
                signer: msg.signer.to_string(),
                reason: "not a member of the requested keygen".to_string(),
            })?;

        let mut voter = self.store.get_keygen_voter(&keygen.id)?.unwrap_or_else(|| {
            KeygenVoter::new(keygen.id, msg.height, keygen.keygen_type, keygen.members.clone())
        });
        let reported = msg.outcome.clone();
        if !voter.sign(node.signer_pub_key, msg.outcome, msg.chains)? {
            return Ok(KeygenProgress::Ignored);
        }
        let observe_points = self.config().observe_slash_points;
        self.inc_slash_points(&node.node_address, observe_points, "failed_observe_keygen");
        self.store.set_keygen_voter(voter.clone())?;

        let ratio = self.config().supermajority;
        let Some(outcome) = voter.consensus(ratio) else {
            return Ok(KeygenProgress::Pending);
        };

        if outcome.is_success() {
            if reported == outcome {
                self.judge_late_signer(height, &mut voter, &node);
                self.store.set_keygen_voter(voter.clone())?;
            }
            if voter.block_height.is_none()
                && voter.awaiting_reports()
                && !self.straggler_timeout_elapsed(&voter, height)
            {
                return Ok(KeygenProgress::AwaitingStragglers);
            }
        }

        match voter.block_height {
            None => self.finalise_keygen(height, voter, outcome),
            Some(finalised) => {
                if finalised + self.config().observation_delay_flexibility >= height {
                    self.dec_slash_points(&node.node_address, observe_points);
                }
                Ok(KeygenProgress::AlreadyFinalised)
            }
        }
    }

    /// First supermajority penalises every member that has not reported yet;
    /// members reporting afterwards get the penalty back.
    fn judge_late_signer(&self, height: u64, voter: &mut KeygenVoter, signer: &NodeAccount) {
        let points = self.config().fail_keygen_slash_points;
        if voter.majority_consensus_height.is_some() {
            self.dec_slash_points(&signer.node_address, points);
            self.release_from_jail(&signer.node_address, height);
            return;
        }

        voter.majority_consensus_height = Some(height);
        let release = height + self.config().jail_time_keygen;
        for member in voter.members.iter().filter(|m| !voter.votes.has_signed(m)) {
            let Some(addr) = self.node_address_of(member) else {
                continue;
            };
            self.inc_slash_points(&addr, points, "failed_vote_keygen");
            self.jail_and_save(&addr, release, "failed to vote keygen in time");
        }
    }

    fn straggler_timeout_elapsed(&self, voter: &KeygenVoter, height: u64) -> bool {
        self.config()
            .keygen_straggler_timeout
            .zip(voter.majority_consensus_height)
            .is_some_and(|(timeout, majority)| majority.saturating_add(timeout) <= height)
    }

    /// Apply the agreed outcome of `voter` at `height`.
    fn finalise_keygen(
        &self,
        height: u64,
        mut voter: KeygenVoter,
        outcome: KeygenOutcome,
    ) -> CustodyResult<KeygenProgress> {
        voter.block_height = Some(height);
        self.store.set_keygen_voter(voter.clone())?;

        let observe_points = self.config().observe_slash_points;
        for signer in voter.votes.signers() {
            if let Some(addr) = self.node_address_of(signer) {
                self.dec_slash_points(&addr, observe_points);
            }
        }

        match outcome {
            KeygenOutcome::Success { pool_pub_key } => {
                let vault_type = match voter.keygen_type {
                    KeygenType::Asgard => VaultType::Asgard,
                    KeygenType::Yggdrasil => VaultType::Yggdrasil,
                };
                let chains = voter.consensus_chains(self.config().supermajority);
                let routers = self.routers_for_new_vault(&chains)?;
                let vault = Vault::new(
                    height,
                    VaultStatus::Init,
                    vault_type,
                    pool_pub_key,
                    chains,
                    routers,
                )
                .with_membership(voter.members.clone());
                self.store.set_vault(vault)?;
                info!(vault = %pool_pub_key, members = voter.members.len(), "[qc-18] keygen succeeded, vault created");
                self.emit(CustodyEvent::KeygenCompleted {
                    pool_pub_key,
                    members: voter.members.clone(),
                });
                metrics::record_keygen_outcome("success");

                let Some(block) = self.store.get_keygen_block(voter.height)? else {
                    return Ok(KeygenProgress::VaultCreated(pool_pub_key));
                };
                let init = self.store.asgard_vaults_by_status(VaultStatus::Init)?;
                if init.len() == block.keygens.len() {
                    for vault in init {
                        self.rotate(height, vault)?;
                    }
                }
                Ok(KeygenProgress::VaultCreated(pool_pub_key))
            }
            KeygenOutcome::Failure { blame } => {
                let points = self.config().fail_keygen_slash_points;
                let release = height + self.config().jail_time_keygen;
                let bond_slash = self
                    .config()
                    .fail_keygen_bond_slash_per_point
                    .saturating_mul(u128::from(points));
                for pk in &blame {
                    let mut node = match self.store.get_node_account_by_pub_key(pk) {
                        Ok(node) => node,
                        Err(e) => {
                            error!(pk = %pk, error = %e, "[qc-18] fail to get blamed node account");
                            continue;
                        }
                    };
                    if node.is_active() {
                        self.inc_slash_points(&node.node_address, points, "fail_keygen");
                        continue;
                    }
                    self.jail(&mut node, release, "failed to perform keygen");
                    if let Err(e) = self.slash_bond_to_reserve(&mut node, bond_slash, "failed_keygen") {
                        error!(node = %node.node_address, error = %e, "[qc-18] fail to slash bond for failed keygen");
                    }
                    if let Err(e) = self.store.set_node_account(node) {
                        error!(pk = %pk, error = %e, "[qc-18] fail to save blamed node account");
                    }
                }
                warn!(blamed = blame.len(), "[qc-18] keygen failed");
                self.emit(CustodyEvent::KeygenFailed {
                    blamed: blame.clone(),
                });
                metrics::record_keygen_outcome("failure");
                Ok(KeygenProgress::Failed { blamed: blame })
            }
        }
    }

    /// Finalise successful keygens whose stragglers ran out of time.
    pub(crate) fn finalise_stragglers(&self, height: u64) -> CustodyResult<()> {
        let Some(timeout) = self.config().keygen_straggler_timeout else {
            return Ok(());
        };
        let ratio = self.config().supermajority;
        for voter in self.store.pending_keygen_voters()? {
            let Some(majority) = voter.majority_consensus_height else {
                continue;
            };
            if majority.saturating_add(timeout) > height {
                continue;
            }
            let Some(outcome) = voter.consensus(ratio) else {
                continue;
            };
            info!(ceremony = %voter.id, majority, "[qc-18] straggler timeout reached, finalising keygen");
            if let Err(e) = self.finalise_keygen(height, voter, outcome) {
                error!(error = %e, "[qc-18] fail to finalise keygen after straggler timeout");
            }
        }
        Ok(())
    }

    pub(crate) fn handle_keysign_failure(
        &self,
        height: u64,
        msg: KeysignFailureMsg,
    ) -> CustodyResult<bool> {
        let node = self.store.get_node_account(&msg.signer)?;
        let retiring_member = self
            .store
            .asgard_vaults_by_status(VaultStatus::Retiring)?
            .iter()
            .any(|v| v.contains(&node.signer_pub_key));
        if !node.is_active() && !retiring_member {
            return Err(CustodyError::Unauthorized {
                signer: msg.signer.to_string(),
                reason: "not an active node or retiring vault member".to_string(),
            });
        }

        if !self.policy.allow_wide_blame() {
            let active = self.store.list_active_validators()?;
            let blamed = msg
                .blame
                .nodes
                .iter()
                .filter(|pk| active.iter().any(|n| n.signer_pub_key == **pk))
                .count();
            if !has_simple_majority(active.len().saturating_sub(blamed), active.len()) {
                return Err(CustodyError::BlameTooWide {
                    blamed,
                    active: active.len(),
                });
            }
        }

        let id = keysign_attempt_id(&msg.vault_pub_key, msg.height, &msg.memo, &msg.coins);
        let mut voter = self
            .store
            .get_keysign_fail_voter(&id)?
            .unwrap_or_else(|| KeysignFailVoter::new(id));
        if !voter.sign(node.signer_pub_key, msg.blame) {
            return Ok(false);
        }
        let observe_points = self.config().observe_slash_points;
        self.inc_slash_points(&node.node_address, observe_points, "failed_observe_keysign");
        self.store.set_keysign_fail_voter(voter.clone())?;

        let mut vault = self.store.get_vault(&msg.vault_pub_key)?;
        let Some(blame) = voter
            .votes
            .consensus_payload(vault.membership(), self.config().supermajority)
        else {
            return Ok(false);
        };

        if voter.should_freeze() && vault.freeze(msg.coins.iter().map(|c| c.asset.chain)) {
            let chains = vault.frozen.clone();
            let pub_key = vault.pub_key;
            self.store.set_vault(vault)?;
            warn!(vault = %pub_key, ?chains, "[qc-18] vault frozen after final-round keysign failure");
            self.emit(CustodyEvent::VaultFrozen { pub_key, chains });
        }

        for signer in voter.votes.signers() {
            if let Some(addr) = self.node_address_of(signer) {
                self.dec_slash_points(&addr, observe_points);
            }
        }
        voter.reset();
        self.store.set_keysign_fail_voter(voter)?;

        let points = self.config().fail_keysign_slash_points;
        let release = height + self.config().jail_time_keysign;
        for pk in &blame.nodes {
            let Some(addr) = self.node_address_of(pk) else {
                continue;
            };
            self.inc_slash_points(&addr, points, "fail_keysign");
            self.jail_and_save(&addr, release, "failed to perform keysign");
        }
        info!(blamed = blame.nodes.len(), reason = %blame.fail_reason, "[qc-18] keysign failure agreed");
        Ok(true)
    }

    pub(crate) fn node_address_of(&self, pk: &PubKey) -> Option<NodeAddress> {
        match self.store.get_node_account_by_pub_key(pk) {
            Ok(node) => Some(node.node_address),
            Err(e) => {
                error!(pk = %pk, error = %e, "[qc-18] fail to get node account by pubkey");
                None
            }
        }
    }
}
