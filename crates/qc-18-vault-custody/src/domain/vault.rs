//! # Vault
//!
//! A vault is a threshold-signed custody address. Asgard vaults pool funds
//! across many nodes; yggdrasil vaults are held by a single node.
//!
//! ```text
//! [Init] ──rotate──→ [Active] ──superseded / chain retired──→ [Retiring] ──no funds──→ [Inactive]
//! ```
//!
//! Membership is fixed at construction. Coin balances never go negative:
//! [`Vault::sub_funds`] saturates at zero.

use serde::{Deserialize, Serialize};
use shared_types::{Asset, Chain, Coin, PubKey};

use super::majority::Ratio;

/// Custody model of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VaultType {
    /// Pooled multi-node vault.
    Asgard,
    /// Per-node operational vault.
    Yggdrasil,
}

/// Lifecycle status of a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VaultStatus {
    Init,
    Active,
    Retiring,
    Inactive,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VaultStatus::Init => "init",
            VaultStatus::Active => "active",
            VaultStatus::Retiring => "retiring",
            VaultStatus::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// Router contract a vault uses on a smart-contract chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContract {
    pub chain: Chain,
    pub router: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub pub_key: PubKey,
    pub vault_type: VaultType,
    pub status: VaultStatus,
    /// Height the current status was entered.
    pub status_since: u64,
    /// Height the vault was created.
    pub block_height: u64,
    membership: Vec<PubKey>,
    pub chains: Vec<Chain>,
    pub coins: Vec<Coin>,
    pub routers: Vec<ChainContract>,
    /// Chains this vault must not sign for after a suspected compromise.
    pub frozen: Vec<Chain>,
    /// Heights at which outbound instructions were queued against this vault.
    pub pending_tx_block_heights: Vec<u64>,
    pub outbound_tx_count: u64,
}

impl Vault {
    pub fn new(
        height: u64,
        status: VaultStatus,
        vault_type: VaultType,
        pub_key: PubKey,
        chains: Vec<Chain>,
        routers: Vec<ChainContract>,
    ) -> Self {
        Self {
            pub_key,
            vault_type,
            status,
            status_since: height,
            block_height: height,
            membership: Vec::new(),
            chains,
            coins: Vec::new(),
            routers,
            frozen: Vec::new(),
            pending_tx_block_heights: Vec::new(),
            outbound_tx_count: 0,
        }
    }

    /// Set the membership; duplicates are dropped and order is canonicalised.
    pub fn with_membership(mut self, members: Vec<PubKey>) -> Self {
        let mut members = members;
        members.sort();
        members.dedup();
        self.membership = members;
        self
    }

    pub fn membership(&self) -> &[PubKey] {
        &self.membership
    }

    /// Signatures needed to produce a valid threshold signature.
    pub fn signing_threshold(&self, ratio: Ratio) -> usize {
        ratio.threshold(self.membership.len())
    }

    pub fn is_asgard(&self) -> bool {
        self.vault_type == VaultType::Asgard
    }

    pub fn is_yggdrasil(&self) -> bool {
        self.vault_type == VaultType::Yggdrasil
    }

    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }

    pub fn is_retiring(&self) -> bool {
        self.status == VaultStatus::Retiring
    }

    pub fn update_status(&mut self, status: VaultStatus, height: u64) {
        self.status = status;
        self.status_since = height;
    }

    pub fn contains(&self, pk: &PubKey) -> bool {
        self.membership.contains(pk)
    }

    /// Set equality against another membership list.
    pub fn membership_equals(&self, other: &[PubKey]) -> bool {
        let mut other = other.to_vec();
        other.sort();
        other.dedup();
        self.membership == other
    }

    pub fn shares_member_with(&self, other: &Vault) -> bool {
        self.membership.iter().any(|m| other.contains(m))
    }

    /// Balance of `asset`; zero when the vault never held it.
    pub fn get_coin(&self, asset: &Asset) -> Coin {
        self.coins
            .iter()
            .find(|c| &c.asset == asset)
            .cloned()
            .unwrap_or_else(|| Coin::new(asset.clone(), 0))
    }

    pub fn has_asset(&self, asset: &Asset) -> bool {
        self.get_coin(asset).amount > 0
    }

    /// True if the vault holds any non-native funds.
    pub fn has_funds(&self) -> bool {
        self.coins.iter().any(|c| !c.asset.is_rune() && !c.is_empty())
    }

    pub fn has_funds_for_chain(&self, chain: Chain) -> bool {
        self.coins
            .iter()
            .any(|c| c.asset.chain == chain && !c.is_empty())
    }

    /// Number of distinct non-empty assets the vault holds on `chain`.
    pub fn coin_length_by_chain(&self, chain: Chain) -> u128 {
        self.coins
            .iter()
            .filter(|c| c.asset.chain == chain && !c.is_empty())
            .count() as u128
    }

    pub fn add_funds(&mut self, coins: &[Coin]) {
        for coin in coins {
            if !self.chains.contains(&coin.asset.chain) {
                self.chains.push(coin.asset.chain);
            }
            match self.coins.iter_mut().find(|c| c.asset == coin.asset) {
                Some(held) => held.amount = held.amount.saturating_add(coin.amount),
                None => self.coins.push(coin.clone()),
            }
        }
    }

    /// Remove funds, flooring each balance at zero.
    pub fn sub_funds(&mut self, coins: &[Coin]) {
        for coin in coins {
            if let Some(held) = self.coins.iter_mut().find(|c| c.asset == coin.asset) {
                held.amount = held.amount.saturating_sub(coin.amount);
            }
        }
    }

    pub fn router_for(&self, chain: Chain) -> Option<&ChainContract> {
        self.routers.iter().find(|r| r.chain == chain)
    }

    pub fn is_frozen(&self, chain: Chain) -> bool {
        self.frozen.contains(&chain)
    }

    /// Freeze `chains`; returns true if anything new was frozen.
    pub fn freeze(&mut self, chains: impl IntoIterator<Item = Chain>) -> bool {
        let before = self.frozen.len();
        for chain in chains {
            if !self.frozen.contains(&chain) {
                self.frozen.push(chain);
            }
        }
        self.frozen.len() != before
    }

    /// Record an outbound queued at `height`, keeping only heights within `period`.
    pub fn append_pending_tx_block_height(&mut self, height: u64, period: u64) {
        self.pending_tx_block_heights.push(height);
        self.pending_tx_block_heights
            .retain(|h| height.saturating_sub(*h) < period);
    }

    /// Forget one pending height once its outbound is observed.
    pub fn remove_pending_tx_block_height(&mut self, height: u64) {
        if let Some(pos) = self
            .pending_tx_block_heights
            .iter()
            .position(|h| *h == height)
        {
            self.pending_tx_block_heights.remove(pos);
        }
    }

    pub fn len_pending_tx_block_heights(&self, current: u64, period: u64) -> usize {
        self.pending_tx_block_heights
            .iter()
            .filter(|h| current.saturating_sub(**h) < period)
            .count()
    }

    /// An outbound queued within the last `period` blocks is still unsigned.
    pub fn has_pending_tx_within(&self, current: u64, period: u64) -> bool {
        self.len_pending_tx_block_heights(current, period) > 0
    }
}

/// Selection helpers over a set of vaults.
pub trait VaultSet {
    /// Sort in place by balance of `asset`, largest first.
    fn sort_by_asset_desc(&mut self, asset: &Asset);
    fn has_coin(&self, asset: &Asset) -> bool;
    fn select_by_min_coin(&self, asset: &Asset) -> Option<&Vault>;
    fn select_by_max_coin(&self, asset: &Asset) -> Option<&Vault>;
}

impl VaultSet for [Vault] {
    fn sort_by_asset_desc(&mut self, asset: &Asset) {
        self.sort_by(|a, b| b.get_coin(asset).amount.cmp(&a.get_coin(asset).amount));
    }

    fn has_coin(&self, asset: &Asset) -> bool {
        self.iter().any(|v| v.has_asset(asset))
    }

    fn select_by_min_coin(&self, asset: &Asset) -> Option<&Vault> {
        // first minimum wins on ties
        self.iter().fold(None, |best: Option<&Vault>, v| match best {
            Some(b) if b.get_coin(asset).amount <= v.get_coin(asset).amount => Some(b),
            _ => Some(v),
        })
    }

    fn select_by_max_coin(&self, asset: &Asset) -> Option<&Vault> {
        self.iter().fold(None, |best: Option<&Vault>, v| match best {
            Some(b) if b.get_coin(asset).amount >= v.get_coin(asset).amount => Some(b),
            _ => Some(v),
        })
    }
}
