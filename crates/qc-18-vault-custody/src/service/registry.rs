//! Vault registry queries: security ranking, router bindings, index upkeep.

use shared_types::{Chain, Coin};
use tracing::{error, warn};

use super::CustodyService;
use crate::domain::{ChainContract, NodeStatus, Page, PageRequest, Pool, Vault, VaultStatus};
use crate::error::CustodyResult;

const POOL_PAGE_SIZE: usize = 100;

impl CustodyService {
    /// RUNE value of `coin` at the pool's spot price; zero without a pool.
    pub(crate) fn rune_value(&self, coin: &Coin) -> u128 {
        if coin.asset.is_rune() {
            return coin.amount;
        }
        match self.store.get_pool(&coin.asset.to_layer1()) {
            Ok(pool) => pool.asset_value_in_rune(coin.amount),
            Err(e) => {
                warn!(asset = %coin.asset, error = %e, "[qc-18] failed to get pool");
                0
            }
        }
    }

    /// Bond of active members minus the value the vault holds.
    ///
    /// Unsigned outbound items within the signing window are netted out:
    /// items leaving the vault reduce its value, items heading to it add.
    pub(crate) fn vault_security(&self, vault: &Vault, height: u64) -> i128 {
        let mut total_bond: u128 = 0;
        for pk in vault.membership() {
            match self.store.get_node_account_by_pub_key(pk) {
                Ok(na) if na.status == NodeStatus::Active => {
                    total_bond = total_bond.saturating_add(na.bond)
                }
                Ok(_) => {}
                Err(e) => error!(pk = %pk, error = %e, "[qc-18] failed to get node account by pubkey"),
            }
        }

        let mut total_value: u128 = vault
            .coins
            .iter()
            .filter(|c| !c.asset.is_rune())
            .map(|c| self.rune_value(c))
            .fold(0, u128::saturating_add);

        let period = self.policy.signing_transaction_period();
        let from = height.saturating_sub(period).max(1);
        for h in from..=height {
            let tx_out = match self.outbound.get_tx_out(h) {
                Ok(tx_out) => tx_out,
                Err(e) => {
                    error!(height = h, error = %e, "[qc-18] unable to get txout");
                    continue;
                }
            };
            for item in tx_out.items.iter().filter(|i| i.is_pending()) {
                let value = self.rune_value(&item.coin);
                if item.vault_pub_key == vault.pub_key {
                    total_value = total_value.saturating_sub(value);
                } else if item.to_address == vault.pub_key.address_for(item.coin.asset.chain) {
                    total_value = total_value.saturating_add(value);
                }
            }
        }

        (total_bond as i128).saturating_sub(total_value as i128)
    }

    /// The vault backed by the largest surplus of bond over value.
    ///
    /// Ties go to the later vault in `vaults`.
    pub(crate) fn most_secure(&self, vaults: &[Vault], height: u64) -> Option<Vault> {
        let mut best: Option<(i128, &Vault)> = None;
        for vault in vaults {
            let security = self.vault_security(vault, height);
            match best {
                Some((s, _)) if s > security => {}
                _ => best = Some((security, vault)),
            }
        }
        best.map(|(_, v)| v.clone())
    }

    /// Configured router contracts for `chains`.
    pub(crate) fn chain_contracts(&self, chains: &[Chain]) -> Vec<ChainContract> {
        self.config()
            .chain_contracts
            .iter()
            .filter(|c| chains.contains(&c.chain))
            .cloned()
            .collect()
    }

    /// Routers for a new vault: inherit the active set's bindings, falling
    /// back to configuration for chains no active vault serves.
    pub(crate) fn routers_for_new_vault(&self, chains: &[Chain]) -> CustodyResult<Vec<ChainContract>> {
        let active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        let configured = self.chain_contracts(chains);
        let mut routers = Vec::new();
        for chain in chains {
            let inherited = active.iter().find_map(|v| v.router_for(*chain)).cloned();
            let router = inherited.or_else(|| configured.iter().find(|c| c.chain == *chain).cloned());
            if let Some(router) = router {
                routers.push(router);
            }
        }
        Ok(routers)
    }

    /// Fill in router bindings for active vaults that have none.
    pub(crate) fn ensure_routers(&self, active: &mut [Vault]) {
        for vault in active.iter_mut().filter(|v| v.routers.is_empty()) {
            let routers = self.chain_contracts(&vault.chains);
            if routers.is_empty() {
                continue;
            }
            vault.routers = routers;
            if let Err(e) = self.store.set_vault(vault.clone()) {
                error!(vault = %vault.pub_key, error = %e, "[qc-18] fail to update chain contract");
            }
        }
    }

    /// Drop inactive asgard vaults from the index; their records remain.
    pub(crate) fn cleanup_asgard_index(&self) -> CustodyResult<()> {
        for vault in self.store.asgard_vaults()? {
            if vault.pub_key.is_empty() || !vault.is_asgard() {
                continue;
            }
            if vault.status == VaultStatus::Inactive {
                if let Err(e) = self.store.remove_from_asgard_index(&vault.pub_key) {
                    error!(vault = %vault.pub_key, error = %e, "[qc-18] fail to remove inactive asgard from index");
                }
            }
        }
        Ok(())
    }

    /// Every pool, walked page by page.
    pub(crate) fn all_pools(&self) -> CustodyResult<Vec<Pool>> {
        let mut pools = Vec::new();
        let mut request = PageRequest::first(POOL_PAGE_SIZE);
        loop {
            let Page { items, next } = self.store.pools_page(request)?;
            pools.extend(items);
            match next {
                Some(after) => {
                    request = PageRequest {
                        after: Some(after),
                        limit: POOL_PAGE_SIZE,
                    }
                }
                None => return Ok(pools),
            }
        }
    }
}
