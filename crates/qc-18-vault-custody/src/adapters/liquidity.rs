//! Pro-rata liquidity withdrawal at spot price.
//!
//! Stands in for the AMM's withdraw handler: the position's share of both
//! pool sides is paid out through the outbound queue under a ragnarok memo,
//! the pool is debited and the position removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use shared_types::{get_safe_share, Asset, Chain, Coin};

use crate::domain::{LiquidityProvider, Memo, TxOutItem};
use crate::error::{CustodyError, CustodyResult};
use crate::ports::outbound::{CustodyStore, LiquidityWithdrawer, OutboundQueue};

const MAX_BASIS_POINTS: u64 = 10_000;

pub struct InMemoryLiquidityWithdrawer {
    store: Arc<dyn CustodyStore>,
    queue: Arc<dyn OutboundQueue>,
    rejected: RwLock<BTreeSet<String>>,
}

impl InMemoryLiquidityWithdrawer {
    pub fn new(store: Arc<dyn CustodyStore>, queue: Arc<dyn OutboundQueue>) -> Self {
        Self {
            store,
            queue,
            rejected: RwLock::new(BTreeSet::new()),
        }
    }

    /// Make every withdrawal of the position keyed `key` fail.
    pub fn reject(&self, key: &str) {
        self.rejected.write().insert(key.to_string());
    }
}

impl LiquidityWithdrawer for InMemoryLiquidityWithdrawer {
    fn withdraw(
        &self,
        height: u64,
        lp: &LiquidityProvider,
        basis_points: u64,
        withdraw_asset: &Asset,
    ) -> CustodyResult<()> {
        if self.rejected.read().contains(&lp.key()) {
            return Err(CustodyError::Store(format!(
                "withdraw rejected for {}",
                lp.key()
            )));
        }
        let mut pool = self.store.get_pool(&lp.asset)?;
        let units = get_safe_share(
            u128::from(basis_points.min(MAX_BASIS_POINTS)),
            u128::from(MAX_BASIS_POINTS),
            lp.units,
        );
        let share_rune = get_safe_share(units, pool.lp_units, pool.balance_rune);
        let share_asset = get_safe_share(units, pool.lp_units, pool.balance_asset);

        let asset_address = lp.asset_address.clone().filter(|a| !a.is_empty());
        let rune_address = lp.rune_address.clone().filter(|a| !a.is_empty());

        // one-sided payouts take the other side at spot
        let (pool_rune_out, pool_asset_out) = match (&rune_address, &asset_address) {
            (Some(_), None) => (share_rune.saturating_add(pool.asset_value_in_rune(share_asset)), 0),
            (Some(_), Some(_)) if withdraw_asset.is_rune() => {
                (share_rune.saturating_add(pool.asset_value_in_rune(share_asset)), 0)
            }
            (None, _) => (0, share_asset.saturating_add(pool.rune_value_in_asset(share_rune))),
            (Some(_), Some(_)) => (share_rune, share_asset),
        };
        let rune_out = pool_rune_out.saturating_add(lp.pending_rune);
        let asset_out = pool_asset_out.saturating_add(lp.pending_asset);
        let memo = Memo::Ragnarok { height };

        if let Some(to) = rune_address.as_ref().filter(|_| rune_out > 0) {
            let item = TxOutItem::new(
                Chain::Thor,
                to.clone(),
                Coin::new(Asset::rune(), rune_out),
                memo.clone(),
            );
            self.queue.try_add_tx_out_item(height, item)?;
        }
        if let Some(to) = asset_address.as_ref().filter(|_| asset_out > 0) {
            let item = TxOutItem::new(
                lp.asset.chain,
                to.clone(),
                Coin::new(lp.asset.clone(), asset_out).with_decimals(pool.decimals),
                memo,
            );
            self.queue.try_add_tx_out_item(height, item)?;
        }

        pool.balance_rune = pool.balance_rune.saturating_sub(pool_rune_out);
        pool.balance_asset = pool.balance_asset.saturating_sub(pool_asset_out);
        pool.lp_units = pool.lp_units.saturating_sub(units);
        self.store.set_pool(pool)?;
        self.store.remove_liquidity_provider(lp)
    }
}
