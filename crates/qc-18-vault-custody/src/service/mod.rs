//! Custody Service - Core business logic
//!
//! [`CustodyService`] implements [`CustodyApi`] on top of the outbound ports.
//! The work is split per concern, each file adding an `impl CustodyService`
//! block:
//!
//! - `registry`: vault security ranking, router bindings, index cleanup
//! - `churn`: genesis, keygen requests, vault rotation
//! - `voting`: keygen outcomes and keysign failures
//! - `migration`: draining retiring vaults
//! - `ragnarok`: chain and pool retirement
//! - `slasher`: bond and slash-point penalties
//! - `observation`: reconciling observed outbounds

mod churn;
mod migration;
mod observation;
mod ragnarok;
mod registry;
mod slasher;
mod voting;

use std::sync::Arc;

use shared_types::{Asset, Coin, NodeAddress, PubKey};
use tracing::{error, info, warn};

use crate::config::{CustodyConfig, CustodyPolicy};
use crate::domain::{ByzantineEvidence, EvidenceKind, NodeAccount, Vault};
use crate::error::CustodyResult;
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::inbound::{
    CustodyApi, KeygenProgress, KeygenResultMsg, KeysignFailureMsg, ObservedOutbound,
};
use crate::ports::outbound::{
    CustodyStore, EventSink, GasOracle, Ledger, LiquidityWithdrawer, ModuleAccount,
    OutboundQueue, PolicyStore,
};

/// Dependencies for CustodyService
pub struct CustodyDependencies {
    pub store: Arc<dyn CustodyStore>,
    pub ledger: Arc<dyn Ledger>,
    pub policy_store: Arc<dyn PolicyStore>,
    pub outbound: Arc<dyn OutboundQueue>,
    pub gas: Arc<dyn GasOracle>,
    pub withdrawer: Arc<dyn LiquidityWithdrawer>,
    pub events: Arc<dyn EventSink>,
}

/// Custody Service
pub struct CustodyService {
    store: Arc<dyn CustodyStore>,
    ledger: Arc<dyn Ledger>,
    outbound: Arc<dyn OutboundQueue>,
    gas: Arc<dyn GasOracle>,
    withdrawer: Arc<dyn LiquidityWithdrawer>,
    events: Arc<dyn EventSink>,
    policy: CustodyPolicy,
}

impl CustodyService {
    /// Create a new CustodyService. Fails on an unusable configuration.
    pub fn new(config: CustodyConfig, deps: CustodyDependencies) -> CustodyResult<Self> {
        config.validate()?;
        Ok(Self {
            store: deps.store,
            ledger: deps.ledger,
            outbound: deps.outbound,
            gas: deps.gas,
            withdrawer: deps.withdrawer,
            events: deps.events,
            policy: CustodyPolicy::new(config, deps.policy_store),
        })
    }

    pub fn policy(&self) -> &CustodyPolicy {
        &self.policy
    }

    fn config(&self) -> &CustodyConfig {
        self.policy.config()
    }

    fn emit(&self, event: CustodyEvent) {
        if let Err(e) = self.events.emit(event) {
            error!(error = %e, "[qc-18] fail to emit event");
        }
    }

    /// Run one end-of-block step, logging instead of propagating failure.
    fn run_step(&self, step: &str, height: u64, f: impl FnOnce() -> CustodyResult<()>) {
        if let Err(e) = f() {
            error!(step, height, error = %e, kind = ?e.kind(), "[qc-18] end block step failed");
        }
    }

    // =========================================================================
    // NODE PENALTIES
    // =========================================================================

    fn inc_slash_points(&self, node: &NodeAddress, points: u64, reason: &str) {
        if points == 0 {
            return;
        }
        if let Err(e) = self.store.inc_slash_points(node, points) {
            error!(node = %node, error = %e, "[qc-18] fail to increase slash points");
            return;
        }
        metrics::record_slash_points(reason, points);
        self.emit(CustodyEvent::SlashPoints {
            node: *node,
            points,
            reason: reason.to_string(),
        });
    }

    fn dec_slash_points(&self, node: &NodeAddress, points: u64) {
        if let Err(e) = self.store.dec_slash_points(node, points) {
            error!(node = %node, error = %e, "[qc-18] fail to decrease slash points");
        }
    }

    /// Jail `node` until `release_height`. An existing later release is kept.
    fn jail(&self, node: &mut NodeAccount, release_height: u64, reason: &str) {
        node.jail_until(release_height, reason);
        info!(node = %node.node_address, release_height, reason, "[qc-18] jailing node");
        self.emit(CustodyEvent::NodeJailed {
            node: node.node_address,
            release_height,
            reason: reason.to_string(),
        });
    }

    fn jail_and_save(&self, node: &NodeAddress, release_height: u64, reason: &str) {
        let result = self.store.get_node_account(node).and_then(|mut na| {
            self.jail(&mut na, release_height, reason);
            self.store.set_node_account(na)
        });
        if let Err(e) = result {
            error!(node = %node, reason, error = %e, "[qc-18] fail to set node account jail");
        }
    }

    fn release_from_jail(&self, node: &NodeAddress, height: u64) {
        let result = self.store.get_node_account(node).and_then(|mut na| {
            na.release(height);
            self.store.set_node_account(na)
        });
        if let Err(e) = result {
            error!(node = %node, error = %e, "[qc-18] fail to release node account from jail");
        }
    }

    /// Move up to `amount` of `node`'s bond into the reserve.
    ///
    /// The ledger moves first; the caller persists `node` afterwards.
    fn slash_bond_to_reserve(
        &self,
        node: &mut NodeAccount,
        amount: u128,
        reason: &str,
    ) -> CustodyResult<u128> {
        let amount = amount.min(node.bond);
        if amount == 0 {
            return Ok(0);
        }
        self.ledger.transfer(
            ModuleAccount::Bond,
            ModuleAccount::Reserve,
            &[Coin::new(Asset::rune(), amount)],
        )?;
        let taken = node.slash_bond(amount);
        info!(node = %node.node_address, amount = taken, reason, "[qc-18] slash bond");
        metrics::record_bond_slashed(reason, taken);
        self.emit(CustodyEvent::BondSlashed {
            node: node.node_address,
            amount: taken,
            reason: reason.to_string(),
        });
        Ok(taken)
    }
}

impl CustodyApi for CustodyService {
    fn genesis(&self, height: u64) -> CustodyResult<()> {
        self.bootstrap_genesis(height)
    }

    fn begin_block(&self, height: u64, evidence: &[ByzantineEvidence]) {
        for ev in evidence {
            match ev.kind {
                EvidenceKind::DuplicateVote => {
                    if let Err(e) = self.handle_double_sign(height, &ev.validator, ev.height) {
                        error!(validator = %ev.validator, error = %e, "[qc-18] fail to slash for double signing a block");
                    }
                }
                kind => warn!(?kind, validator = %ev.validator, "[qc-18] ignored unknown evidence type"),
            }
        }
    }

    fn end_block(&self, height: u64) {
        self.run_step("manage_chains", height, || self.manage_chains(height));
        self.run_step("migrate_funds", height, || self.migrate_funds(height));
        self.run_step("check_pool_ragnarok", height, || self.check_pool_ragnarok(height));
        self.run_step("finalise_stragglers", height, || self.finalise_stragglers(height));
        self.run_step("lack_observing", height, || self.lack_observing(height));
        self.run_step("lack_signing", height, || self.lack_signing(height));
        self.run_step("cleanup_asgard_index", height, || self.cleanup_asgard_index());
    }

    fn trigger_keygen(&self, height: u64, members: Vec<PubKey>) -> CustodyResult<()> {
        self.request_keygen(height, members)
    }

    fn rotate_vault(&self, height: u64, vault: Vault) -> CustodyResult<()> {
        self.rotate(height, vault)
    }

    fn process_keygen_result(
        &self,
        height: u64,
        msg: KeygenResultMsg,
    ) -> CustodyResult<KeygenProgress> {
        self.handle_keygen_result(height, msg)
    }

    fn process_keysign_failure(&self, height: u64, msg: KeysignFailureMsg) -> CustodyResult<bool> {
        self.handle_keysign_failure(height, msg)
    }

    fn record_outbound_observed(
        &self,
        height: u64,
        observed: ObservedOutbound,
    ) -> CustodyResult<()> {
        self.reconcile_outbound(height, observed)
    }

    fn slash_vault(
        &self,
        height: u64,
        vault: &PubKey,
        coins: &[Coin],
    ) -> CustodyResult<()> {
        self.slash_vault_overspend(height, vault, coins)
    }

    fn handle_double_sign(
        &self,
        height: u64,
        cons_address: &NodeAddress,
        infraction_height: u64,
    ) -> CustodyResult<()> {
        self.slash_double_sign(height, cons_address, infraction_height)
    }

    fn lack_observing(&self, height: u64) -> CustodyResult<()> {
        self.slash_lack_observing(height)
    }

    fn lack_signing(&self, height: u64) -> CustodyResult<()> {
        self.slash_lack_signing(height)
    }
}
