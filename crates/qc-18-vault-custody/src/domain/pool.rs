//! Liquidity pools and positions as seen by the custody core.
//!
//! AMM pricing lives elsewhere; the core only needs spot conversions to value
//! coins in RUNE and to keep `balance_rune`/`balance_asset` consistent with
//! what vaults actually hold.

use serde::{Deserialize, Serialize};
use shared_types::{get_uncapped_share, Asset};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolStatus {
    Available,
    /// Accepting no new inflow.
    Staged,
    /// Terminal; every ragnarok entry point refuses to touch it.
    Suspended,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoolStatus::Available => "Available",
            PoolStatus::Staged => "Staged",
            PoolStatus::Suspended => "Suspended",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub asset: Asset,
    pub balance_rune: u128,
    pub balance_asset: u128,
    pub lp_units: u128,
    pub status: PoolStatus,
    pub status_since: u64,
    /// Precision of the asset on its external chain.
    pub decimals: u8,
}

impl Pool {
    pub fn new(asset: Asset) -> Self {
        Self {
            asset,
            balance_rune: 0,
            balance_asset: 0,
            lp_units: 0,
            status: PoolStatus::Available,
            status_since: 0,
            decimals: 0,
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.status == PoolStatus::Suspended
    }

    pub fn is_available(&self) -> bool {
        self.status == PoolStatus::Available
    }

    /// Spot RUNE value of `amount` of the pool asset.
    pub fn asset_value_in_rune(&self, amount: u128) -> u128 {
        if self.balance_rune == 0 || self.balance_asset == 0 {
            return 0;
        }
        get_uncapped_share(amount, self.balance_asset, self.balance_rune)
    }

    /// Spot asset value of `amount` RUNE.
    pub fn rune_value_in_asset(&self, amount: u128) -> u128 {
        if self.balance_rune == 0 || self.balance_asset == 0 {
            return 0;
        }
        get_uncapped_share(amount, self.balance_rune, self.balance_asset)
    }

    /// RUNE that restores the pool's price after `amount` asset leaves it.
    ///
    /// `balance_rune * amount / (balance_asset - amount)`; zero when the
    /// withdrawal would empty the asset side.
    pub fn rune_reimbursement_for_asset_withdrawal(&self, amount: u128) -> u128 {
        let remaining = self.balance_asset.saturating_sub(amount);
        if remaining == 0 || self.balance_rune == 0 {
            return 0;
        }
        get_uncapped_share(amount, remaining, self.balance_rune)
    }
}

/// A liquidity position in a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityProvider {
    pub asset: Asset,
    pub rune_address: Option<String>,
    pub asset_address: Option<String>,
    pub units: u128,
    pub pending_rune: u128,
    pub pending_asset: u128,
    pub last_add_height: u64,
}

impl LiquidityProvider {
    pub fn new(asset: Asset, rune_address: Option<String>, asset_address: Option<String>) -> Self {
        Self {
            asset,
            rune_address,
            asset_address,
            units: 0,
            pending_rune: 0,
            pending_asset: 0,
            last_add_height: 0,
        }
    }

    /// Key that identifies this position within its pool.
    pub fn key(&self) -> String {
        self.rune_address
            .clone()
            .or_else(|| self.asset_address.clone())
            .unwrap_or_default()
    }

    /// A position with no owning address cannot be withdrawn to anyone.
    pub fn is_valid(&self) -> bool {
        let present = |a: &Option<String>| a.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.rune_address) || present(&self.asset_address)
    }

    pub fn is_empty(&self) -> bool {
        self.units == 0 && self.pending_rune == 0 && self.pending_asset == 0
    }
}
