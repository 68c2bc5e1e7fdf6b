//! Penalties backing custody with bonded stake.
//!
//! - double signing: a fixed share of the minimum bond, Bond -> Reserve
//! - vault overspend: `vault_slash_ratio` of the stolen value, split across
//!   the vault's members pro rata to bond
//! - lack of observation and signing: slash points; unsigned outbounds are
//!   handed to another vault

use std::collections::BTreeSet;

use shared_types::{get_safe_share, get_uncapped_share, Asset, Coin, NodeAddress, PubKey, TxId};
use tracing::{error, info, warn};

use super::CustodyService;
use crate::config::PolicyKey;
use crate::domain::{has_super_majority, NodeAccount, Pool, Vault, VaultSet, VaultStatus};
use crate::error::{CustodyError, CustodyResult};
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::outbound::{ModuleAccount, StateOperation};

const MAX_BASIS_POINTS: u128 = 10_000;

impl CustodyService {
    pub(crate) fn slash_double_sign(
        &self,
        height: u64,
        cons_address: &NodeAddress,
        infraction_height: u64,
    ) -> CustodyResult<()> {
        let max_age = self.config().double_sign_max_age;
        if height.saturating_sub(infraction_height) > max_age {
            info!(validator = %cons_address, infraction_height, "[qc-18] double sign evidence too old, ignoring");
            return Ok(());
        }

        let mut node = self
            .store
            .list_active_validators()?
            .into_iter()
            .find(|n| n.validator_cons_address == *cons_address)
            .ok_or_else(|| CustodyError::NodeNotFound {
                node: cons_address.to_string(),
            })?;

        let amount = get_uncapped_share(
            u128::from(self.config().double_sign_slash_basis_points),
            MAX_BASIS_POINTS,
            self.policy.minimum_bond(),
        );
        if node.bond == 0 {
            return Err(CustodyError::InsufficientFunds {
                holder: node.node_address.to_string(),
                asset: Asset::rune(),
                needed: amount,
                available: 0,
            });
        }

        self.slash_bond_to_reserve(&mut node, amount, "double_sign")?;
        self.store.set_node_account(node)
    }

    pub(crate) fn slash_lack_observing(&self, height: u64) -> CustodyResult<()> {
        let period = self.policy.signing_transaction_period();
        if height < period {
            return Ok(());
        }
        let tx_out = self.outbound.get_tx_out(height - period)?;
        let active = self.store.list_active_validators()?;
        let points = self.config().lack_of_observation_penalty;

        let mut seen = BTreeSet::new();
        for in_hash in tx_out.items.iter().filter_map(|i| i.real_in_hash()) {
            if !seen.insert(in_hash) {
                continue;
            }
            let Some(voter) = self.store.get_observed_tx_voter(&in_hash)? else {
                continue;
            };
            let signers = voter.all_signers();
            let reference = voter.reference_height();
            for node in &active {
                // joined after the observation
                if node.active_block_height > reference {
                    continue;
                }
                if !signers.contains(&node.node_address) {
                    self.inc_slash_points(&node.node_address, points, "not_observing");
                }
            }
        }
        Ok(())
    }

    /// Penalise vaults that left an outbound unsigned for a full signing
    /// window and hand the instruction to another active vault.
    pub(crate) fn slash_lack_signing(&self, height: u64) -> CustodyResult<()> {
        let period = self.policy.signing_transaction_period();
        if height < period {
            return Ok(());
        }
        let scheduled = height - period;
        let mut tx_out = self.outbound.get_tx_out(scheduled)?;
        let active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        let max_attempts = self.policy.max_outbound_attempts();

        let mut result = Ok(());
        let mut changed = false;
        for idx in 0..tx_out.items.len() {
            let item = tx_out.items[idx].clone();
            if !item.is_pending() {
                continue;
            }
            let vault = match self.store.get_vault(&item.vault_pub_key) {
                Ok(vault) => vault,
                Err(e) => {
                    error!(vault = %item.vault_pub_key, error = %e, "[qc-18] fail to get vault of unsigned outbound");
                    continue;
                }
            };

            if vault.is_yggdrasil() && !self.policy.is_chain_halted(item.chain, height) {
                if let Some(addr) = self.node_address_of(&vault.pub_key) {
                    self.inc_slash_points(&addr, period * 2, "not_signing");
                    self.jail_and_save(&addr, height + period * 2, "fail to send yggdrasil transaction");
                }
            }
            if item.memo.is_internal() {
                continue;
            }

            let mut voter = None;
            if !item.memo.is_ragnarok() {
                let Some(in_hash) = item.real_in_hash() else {
                    continue;
                };
                match self.store.get_observed_tx_voter(&in_hash)? {
                    Some(v) => voter = Some(v),
                    None => {
                        result = Err(CustodyError::Store(format!(
                            "no observed tx voter for {in_hash}"
                        )));
                        continue;
                    }
                }
            }

            let reference = voter.as_ref().map_or(scheduled, |v| v.reference_height());
            let age = height.saturating_sub(reference);
            if max_attempts > 0 && age / period >= max_attempts {
                info!(in_hash = ?item.in_hash, attempts = age / period, "[qc-18] outbound exceeded max attempts, dropping");
                continue;
            }

            let target = self.reschedule_target(&active, &vault, &item.coin, age, period);
            let Some(target) = target else {
                warn!(chain = %item.chain, "[qc-18] no active vault to reschedule outbound");
                continue;
            };
            if !item.coin.asset.is_rune() && !self.store.pool_exists(&item.coin.asset.to_layer1()) {
                warn!(asset = %item.coin.asset, "[qc-18] no pool for rescheduled asset, skipping");
                continue;
            }

            if let Some(mut voter) = voter {
                if voter.is_done() {
                    tx_out.items[idx].out_hash = voter.out_txs.first().copied();
                    changed = true;
                    continue;
                }
                voter.reassign_action(&item, target.pub_key);
                self.store.set_observed_tx_voter(voter)?;
            }

            let mut rescheduled = item.clone();
            rescheduled.vault_pub_key = target.pub_key;
            rescheduled.max_gas = vec![self.gas.max_gas(item.chain)?];
            rescheduled.gas_rate = self.gas.gas_rate(item.chain);
            rescheduled.out_hash = None;
            self.outbound.unsafe_add_tx_out_item(height, rescheduled)?;
            info!(from = %item.vault_pub_key, to = %target.pub_key, coin = %item.coin, "[qc-18] outbound rescheduled");

            tx_out.items[idx].out_hash = Some(TxId::BLANK);
            changed = true;
        }

        if changed {
            self.outbound.set_tx_out(tx_out)?;
        }
        result
    }

    /// Pick the vault that takes over an unsigned outbound.
    ///
    /// Candidates are active vaults able to cover `coin` on an unfrozen
    /// chain, richest first; each further attempt moves one step along the
    /// list, skipping the vault that failed.
    fn reschedule_target(
        &self,
        active: &[Vault],
        failed: &Vault,
        coin: &Coin,
        age: u64,
        period: u64,
    ) -> Option<Vault> {
        let mut candidates: Vec<Vault> = active
            .iter()
            .filter(|v| v.get_coin(&coin.asset).amount >= coin.amount && !v.is_frozen(coin.asset.chain))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return active.first().cloned();
        }
        candidates.sort_by_asset_desc(&coin.asset);

        let age = if failed.is_yggdrasil() {
            age.saturating_sub(period)
        } else {
            age
        };
        let mut rep = (age / period) as usize;
        if candidates[rep % candidates.len()].pub_key == failed.pub_key {
            rep += 1;
        }
        Some(candidates[rep % candidates.len()].clone())
    }

    /// Make a vault's members cover `coins` that left it without authorisation.
    pub(crate) fn slash_vault_overspend(
        &self,
        height: u64,
        pub_key: &PubKey,
        coins: &[Coin],
    ) -> CustodyResult<()> {
        if coins.iter().all(Coin::is_empty) {
            return Ok(());
        }
        let vault = self.store.get_vault(pub_key)?;
        let keys = if vault.membership().is_empty() {
            vec![vault.pub_key]
        } else {
            vault.membership().to_vec()
        };
        let mut members: Vec<NodeAccount> = keys
            .iter()
            .filter_map(|pk| match self.store.get_node_account_by_pub_key(pk) {
                Ok(node) => Some(node),
                Err(e) if e.is_not_found() => {
                    warn!(pk = %pk, "[qc-18] vault member is not a node, skipping");
                    None
                }
                Err(e) => {
                    error!(pk = %pk, error = %e, "[qc-18] fail to get vault member");
                    None
                }
            })
            .collect();

        for coin in coins.iter().filter(|c| !c.is_empty()) {
            let (value, pool) = if coin.asset.is_rune() {
                (coin.amount, None)
            } else {
                match self.store.get_pool(&coin.asset.to_layer1()) {
                    Ok(pool) if pool.balance_asset > 0 && pool.balance_rune > 0 => {
                        let removed = coin.amount.min(pool.balance_asset);
                        (pool.rune_reimbursement_for_asset_withdrawal(removed), Some((pool, removed)))
                    }
                    Ok(_) => {
                        warn!(asset = %coin.asset, "[qc-18] pool is empty, cannot value slash");
                        continue;
                    }
                    Err(e) => {
                        warn!(asset = %coin.asset, error = %e, "[qc-18] fail to get pool for slash");
                        continue;
                    }
                }
            };

            if value == 0 {
                continue;
            }
            if let Some((pool, removed)) = pool {
                self.reimburse_pool(pool, removed, value)?;
            }

            let total = self.config().vault_slash_ratio.apply(value);
            let threshold = self.policy.pause_on_slash_threshold();
            if threshold > 0 && total >= threshold {
                self.pause_after_slash(height, coin);
            }
            self.slash_members(&mut members, coin, value, total)?;
        }

        if vault.is_yggdrasil() {
            for member in members.iter_mut().filter(|m| m.bond == 0) {
                if self.ban_would_break_quorum(member)? {
                    info!(node = %member.node_address, "[qc-18] skipping ban, would break vault quorum");
                    continue;
                }
                warn!(node = %member.node_address, "[qc-18] yggdrasil owner bond exhausted, forcing leave");
                member.force_leave();
            }
            self.store.atomic_batch_write(
                members.into_iter().map(StateOperation::PutNode).collect(),
            )?;
        }
        Ok(())
    }

    /// Swap `removed` of the pool's asset for `value` RUNE, ahead of and
    /// independent from what the bonds can cover.
    fn reimburse_pool(&self, mut pool: Pool, removed: u128, value: u128) -> CustodyResult<()> {
        pool.balance_asset = pool.balance_asset.saturating_sub(removed);
        pool.balance_rune = pool.balance_rune.saturating_add(value);
        let asset = pool.asset.clone();
        self.store.set_pool(pool)?;
        self.emit(CustodyEvent::Slash {
            asset,
            asset_removed: removed,
            rune_added: value,
        });
        Ok(())
    }

    /// Take `total` from `members` pro rata to bond. Up to `value` of what is
    /// taken backs the asgard module; the remainder goes to the reserve.
    fn slash_members(
        &self,
        members: &mut [NodeAccount],
        coin: &Coin,
        value: u128,
        total: u128,
    ) -> CustodyResult<()> {
        let mut remaining_bond = members.iter().map(|m| m.bond).fold(0u128, u128::saturating_add);
        let mut remaining_slash = total;
        let mut shares = Vec::with_capacity(members.len());
        for member in members.iter() {
            let share = get_safe_share(member.bond, remaining_bond, remaining_slash).min(member.bond);
            remaining_bond = remaining_bond.saturating_sub(member.bond);
            remaining_slash = remaining_slash.saturating_sub(share);
            shares.push(share);
        }
        let taken: u128 = shares.iter().fold(0, |acc, s| acc.saturating_add(*s));

        let to_asgard = value.min(taken);
        let to_reserve = taken - to_asgard;
        if to_asgard > 0 {
            self.ledger.transfer(
                ModuleAccount::Bond,
                ModuleAccount::Asgard,
                &[Coin::new(Asset::rune(), to_asgard)],
            )?;
        }
        if to_reserve > 0 {
            self.ledger.transfer(
                ModuleAccount::Bond,
                ModuleAccount::Reserve,
                &[Coin::new(Asset::rune(), to_reserve)],
            )?;
        }

        for (member, share) in members.iter_mut().zip(shares) {
            let slashed = member.slash_bond(share);
            if slashed == 0 {
                continue;
            }
            metrics::record_bond_slashed("vault_overspend", slashed);
            self.emit(CustodyEvent::BondSlashed {
                node: member.node_address,
                amount: slashed,
                reason: "vault_overspend".to_string(),
            });
        }
        self.store.atomic_batch_write(
            members
                .iter()
                .cloned()
                .map(StateOperation::PutNode)
                .collect(),
        )?;

        info!(asset = %coin.asset, value, total, taken, "[qc-18] vault members slashed");
        Ok(())
    }

    fn pause_after_slash(&self, height: u64, coin: &Coin) {
        let value = i64::try_from(height).unwrap_or(i64::MAX);
        for key in [PolicyKey::StopFundYggdrasil, PolicyKey::HaltChain(coin.asset.chain)] {
            let name = key.to_string();
            match self.policy.raise(key, height) {
                Ok(()) => {
                    warn!(key = %name, height, "[qc-18] large slash, pausing");
                    self.emit(CustodyEvent::PolicySet { key: name, value });
                }
                Err(e) => error!(key = %name, error = %e, "[qc-18] fail to set policy after slash"),
            }
        }
    }

    /// Whether removing `member` would drop any vault it signs for below
    /// supermajority of active members.
    fn ban_would_break_quorum(&self, member: &NodeAccount) -> CustodyResult<bool> {
        for vault_pk in &member.signer_membership {
            if !self.store.vault_exists(vault_pk) {
                continue;
            }
            let vault = self.store.get_vault(vault_pk)?;
            if !vault.is_asgard() || !matches!(vault.status, VaultStatus::Active | VaultStatus::Retiring) {
                continue;
            }
            let mut remaining = 0;
            for pk in vault.membership().iter().filter(|pk| **pk != member.signer_pub_key) {
                match self.store.get_node_account_by_pub_key(pk) {
                    Ok(node) if node.is_active() => remaining += 1,
                    Ok(_) => {}
                    Err(e) => error!(pk = %pk, error = %e, "[qc-18] fail to get vault member"),
                }
            }
            if !has_super_majority(remaining, vault.membership().len()) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
