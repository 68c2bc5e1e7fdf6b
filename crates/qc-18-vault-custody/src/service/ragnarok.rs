//! Retirement of whole chains and of single pools.
//!
//! Both run in rounds keyed off a start height: round one recalls yggdrasil
//! funds for the chain, later rounds force-withdraw liquidity positions a
//! page at a time. A pool whose positions are all gone is suspended (gas
//! pools) or removed.

use std::collections::BTreeSet;

use shared_types::{Asset, Chain, Coin, TxId};
use tracing::{debug, error, info, warn};

use super::CustodyService;
use crate::domain::{
    LiquidityProvider, Memo, PageRequest, Pool, PoolStatus, TxOutItem, VaultSet, VaultStatus,
    WorkBudget,
};
use crate::error::{CustodyError, CustodyResult};
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::outbound::ModuleAccount;

const MAX_WITHDRAW_BASIS_POINTS: u64 = 10_000;

impl CustodyService {
    /// Retire chains served by retiring vaults but by no active vault.
    pub(crate) fn manage_chains(&self, height: u64) -> CustodyResult<()> {
        let active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        let retiring = self.store.asgard_vaults_by_status(VaultStatus::Retiring)?;

        let served: BTreeSet<Chain> = active.iter().flat_map(|v| v.chains.iter().copied()).collect();
        let retired: BTreeSet<Chain> = retiring
            .iter()
            .flat_map(|v| v.chains.iter().copied())
            .filter(|c| !served.contains(c))
            .collect();
        if retired.is_empty() {
            return Ok(());
        }

        let anchor = active
            .select_by_min_coin(&Asset::rune())
            .ok_or(CustodyError::NoActiveVaults)?;
        let interval = self.policy.fund_migration_interval();
        let nth = (height.saturating_sub(anchor.status_since) / interval + 1)
            .min(self.config().chain_ragnarok_max_rounds);

        for chain in retired {
            let result = if nth == 1 {
                self.recall_chain_funds(height, chain)
            } else {
                self.ragnarok_chain(height, chain)
            };
            if let Err(e) = result {
                error!(chain = %chain, nth, error = %e, "[qc-18] fail to retire chain");
            }
        }
        Ok(())
    }

    /// Ask every bonded node's yggdrasil vault to return its funds on `chain`.
    fn recall_chain_funds(&self, height: u64, chain: Chain) -> CustodyResult<()> {
        let active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        let target = self
            .most_secure(&active, height)
            .ok_or(CustodyError::NoActiveVaults)?;
        let to_address = target.pub_key.address_for(chain);
        let max_gas = self.gas.max_gas(chain)?;
        let gas_rate = self.gas.gas_rate(chain);

        for node in self.store.list_bonded_nodes()? {
            let pk = node.signer_pub_key;
            if !self.store.vault_exists(&pk) {
                continue;
            }
            let ygg = self.store.get_vault(&pk)?;
            if ygg.is_asgard() || !ygg.has_funds_for_chain(chain) {
                continue;
            }

            let mut item = TxOutItem::new(
                chain,
                to_address.clone(),
                Coin::new(Asset::rune(), 0),
                Memo::YggdrasilReturn { height },
            );
            item.vault_pub_key = pk;
            item.in_hash = Some(TxId::BLANK);
            item.max_gas = vec![max_gas.clone()];
            item.gas_rate = gas_rate;
            self.outbound.unsafe_add_tx_out_item(height, item)?;
            info!(yggdrasil = %pk, chain = %chain, "[qc-18] recall scheduled");
            self.emit(CustodyEvent::RecallScheduled {
                chain,
                yggdrasil: pk,
            });
        }
        Ok(())
    }

    fn ragnarok_chain(&self, height: u64, chain: Chain) -> CustodyResult<()> {
        if chain.is_native() {
            return Err(CustodyError::NativeChainRagnarok { chain });
        }
        if self.store.list_active_validators()?.is_empty() {
            return Err(CustodyError::NoActiveNodes);
        }
        for pool in self.all_pools()? {
            if pool.asset.chain != chain || pool.lp_units == 0 {
                continue;
            }
            if let Err(e) = self.withdraw_liquidity(height, &pool) {
                error!(asset = %pool.asset, error = %e, "[qc-18] fail to ragnarok pool");
            }
        }
        Ok(())
    }

    /// Force-withdraw positions of `pool` within this block's budget.
    fn withdraw_liquidity(&self, height: u64, pool: &Pool) -> CustodyResult<()> {
        if pool.is_suspended() {
            return Ok(());
        }

        let page_size = self.config().ragnarok_positions_per_block;
        let mut budget = WorkBudget::new(page_size);
        let mut request = PageRequest::first(page_size);
        loop {
            let page = self.store.liquidity_providers_page(&pool.asset, request)?;
            for lp in page.items {
                if !budget.consume() {
                    break;
                }
                self.withdraw_position(height, &lp);
            }
            match page.next {
                Some(after) if !budget.is_exhausted() => {
                    request = PageRequest {
                        after: Some(after),
                        limit: budget.remaining(),
                    };
                }
                _ => break,
            }
        }
        if budget.is_exhausted() {
            debug!(asset = %pool.asset, "[qc-18] ragnarok budget spent, resuming next round");
            return Ok(());
        }

        // every position is gone
        let mut pool = self.store.get_pool(&pool.asset)?;
        if !pool.asset.is_gas_asset() {
            self.store.remove_pool(&pool.asset)?;
            info!(asset = %pool.asset, "[qc-18] pool removed after ragnarok");
            self.emit(CustodyEvent::PoolRemoved { asset: pool.asset });
            return Ok(());
        }
        pool.status = PoolStatus::Suspended;
        pool.status_since = height;
        self.store.set_pool(pool.clone())?;
        info!(asset = %pool.asset, "[qc-18] pool suspended after ragnarok");
        self.emit(CustodyEvent::PoolStatusChanged {
            asset: pool.asset,
            status: PoolStatus::Suspended,
        });
        Ok(())
    }

    fn withdraw_position(&self, height: u64, lp: &LiquidityProvider) {
        if lp.is_empty() || !lp.is_valid() {
            if let Err(e) = self.store.remove_liquidity_provider(lp) {
                error!(asset = %lp.asset, error = %e, "[qc-18] fail to remove empty position");
            }
            return;
        }

        let has_rune = lp.rune_address.as_deref().is_some_and(|a| !a.is_empty());
        let has_asset = lp.asset_address.as_deref().is_some_and(|a| !a.is_empty());
        let withdraw_asset = if has_rune && !has_asset {
            Asset::rune()
        } else {
            lp.asset.clone()
        };

        match self
            .withdrawer
            .withdraw(height, lp, MAX_WITHDRAW_BASIS_POINTS, &withdraw_asset)
        {
            Ok(()) => metrics::record_position_withdrawn(),
            Err(e) => {
                error!(asset = %lp.asset, position = %lp.key(), error = %e, "[qc-18] fail to withdraw, removing position");
                if let Err(e) = self.store.remove_liquidity_provider(lp) {
                    error!(asset = %lp.asset, error = %e, "[qc-18] fail to remove position");
                }
            }
        }
    }

    /// Retire pools flagged for ragnarok by administrative policy.
    pub(crate) fn check_pool_ragnarok(&self, height: u64) -> CustodyResult<()> {
        if height % self.policy.fund_migration_interval() != 0 {
            return Ok(());
        }
        let pools = self.all_pools()?;
        for pool in &pools {
            if !self.policy.is_pool_ragnarok_requested(&pool.asset) {
                continue;
            }
            // a gas pool goes last on its chain
            if pool.asset.is_gas_asset() {
                let dependents = pools.iter().any(|p| {
                    p.asset.chain == pool.asset.chain
                        && !p.asset.is_gas_asset()
                        && !p.is_suspended()
                });
                if dependents {
                    warn!(asset = %pool.asset, "[qc-18] gas pool ragnarok waits for chain pools");
                    continue;
                }
            }
            if let Err(e) = self.ragnarok_pool(height, pool) {
                error!(asset = %pool.asset, error = %e, "[qc-18] fail to ragnarok pool");
            }
        }
        Ok(())
    }

    fn ragnarok_pool(&self, height: u64, pool: &Pool) -> CustodyResult<()> {
        if pool.is_suspended() {
            return Ok(());
        }

        let start = match self.store.pool_ragnarok_start(&pool.asset)? {
            Some(start) if start > 0 => start,
            _ => {
                if let Err(e) = self.redeem_synth(&pool.asset) {
                    error!(asset = %pool.asset, error = %e, "[qc-18] fail to redeem synths");
                }
                self.store.set_pool_ragnarok_start(&pool.asset, height)?;
                height
            }
        };
        let nth = height.saturating_sub(start) / self.policy.fund_migration_interval() + 1;

        let mut staged = self.store.get_pool(&pool.asset)?;
        if staged.status != PoolStatus::Staged {
            staged.status = PoolStatus::Staged;
            staged.status_since = height;
            self.store.set_pool(staged.clone())?;
            self.emit(CustodyEvent::PoolStatusChanged {
                asset: staged.asset.clone(),
                status: PoolStatus::Staged,
            });
        }

        if nth == 1 {
            return self.recall_chain_funds(height, pool.asset.chain);
        }
        if self.store.list_active_validators()?.is_empty() {
            return Err(CustodyError::NoActiveNodes);
        }
        self.withdraw_liquidity(height, &staged)
    }

    /// Retire the pool's synthetic supply: its RUNE value leaves the pool for
    /// the reserve.
    fn redeem_synth(&self, asset: &Asset) -> CustodyResult<()> {
        let supply = self.ledger.total_supply(&asset.to_synth());
        if supply == 0 {
            return Ok(());
        }
        let mut pool = self.store.get_pool(asset)?;
        let rune = pool.asset_value_in_rune(supply);
        if rune == 0 {
            return Ok(());
        }
        self.ledger.transfer(
            ModuleAccount::Asgard,
            ModuleAccount::Reserve,
            &[Coin::new(Asset::rune(), rune)],
        )?;
        pool.balance_rune = pool.balance_rune.saturating_sub(rune);
        self.store.set_pool(pool)?;
        info!(asset = %asset, supply, rune, "[qc-18] synthetic supply redeemed");
        self.emit(CustodyEvent::PoolBalanceChanged {
            asset: asset.clone(),
            rune_added: 0,
            asset_removed: 0,
            reason: "redeem synths".to_string(),
        });
        Ok(())
    }
}
