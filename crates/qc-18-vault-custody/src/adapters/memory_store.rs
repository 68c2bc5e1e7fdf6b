//! In-memory custody state.
//!
//! All records sit behind one lock so [`CustodyStore::atomic_batch_write`]
//! is trivially all-or-nothing.

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use shared_types::{Asset, NodeAddress, PubKey, TxId};

use crate::domain::{
    CeremonyId, KeygenBlock, KeygenVoter, KeysignFailVoter, LiquidityProvider, NodeAccount,
    NodeStatus, ObservedTxVoter, Page, PageRequest, Pool, Vault, VaultStatus,
};
use crate::error::{CustodyError, CustodyResult};
use crate::ports::outbound::{CustodyStore, StateOperation};

#[derive(Default)]
struct State {
    vaults: BTreeMap<PubKey, Vault>,
    asgard_index: Vec<PubKey>,
    nodes: BTreeMap<NodeAddress, NodeAccount>,
    slash_points: BTreeMap<NodeAddress, u64>,
    /// Keyed by the asset's string form so pages resume by key.
    pools: BTreeMap<String, Pool>,
    positions: BTreeMap<String, BTreeMap<String, LiquidityProvider>>,
    ragnarok_starts: BTreeMap<Asset, u64>,
    keygen_blocks: BTreeMap<u64, KeygenBlock>,
    keygen_voters: BTreeMap<CeremonyId, KeygenVoter>,
    keysign_fail_voters: BTreeMap<CeremonyId, KeysignFailVoter>,
    observed: BTreeMap<TxId, ObservedTxVoter>,
}

impl State {
    fn put_vault(&mut self, vault: Vault) {
        if vault.is_asgard() && !self.asgard_index.contains(&vault.pub_key) {
            self.asgard_index.push(vault.pub_key);
        }
        self.vaults.insert(vault.pub_key, vault);
    }
}

/// In-memory implementation of [`CustodyStore`] for testing and simulation.
pub struct InMemoryCustodyStore {
    state: RwLock<State>,
}

impl InMemoryCustodyStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
        }
    }

    pub fn add_liquidity_provider(&self, lp: LiquidityProvider) {
        self.state
            .write()
            .positions
            .entry(lp.asset.to_string())
            .or_default()
            .insert(lp.key(), lp);
    }

    pub fn liquidity_provider_count(&self, asset: &Asset) -> usize {
        self.state
            .read()
            .positions
            .get(&asset.to_string())
            .map_or(0, BTreeMap::len)
    }

    pub fn all_vaults(&self) -> Vec<Vault> {
        self.state.read().vaults.values().cloned().collect()
    }

    pub fn is_indexed(&self, pk: &PubKey) -> bool {
        self.state.read().asgard_index.contains(pk)
    }
}

impl Default for InMemoryCustodyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn page_after<T: Clone>(map: &BTreeMap<String, T>, request: &PageRequest) -> Page<T> {
    let lower = match &request.after {
        Some(key) => Bound::Excluded(key.clone()),
        None => Bound::Unbounded,
    };
    let mut iter = map.range((lower, Bound::Unbounded));
    let mut items = Vec::new();
    let mut last_key = None;
    for (key, value) in iter.by_ref().take(request.limit) {
        items.push(value.clone());
        last_key = Some(key.clone());
    }
    let next = if iter.next().is_some() { last_key } else { None };
    Page { items, next }
}

impl CustodyStore for InMemoryCustodyStore {
    fn get_vault(&self, pk: &PubKey) -> CustodyResult<Vault> {
        self.state
            .read()
            .vaults
            .get(pk)
            .cloned()
            .ok_or(CustodyError::VaultNotFound { pubkey: *pk })
    }

    fn vault_exists(&self, pk: &PubKey) -> bool {
        self.state.read().vaults.contains_key(pk)
    }

    fn set_vault(&self, vault: Vault) -> CustodyResult<()> {
        self.state.write().put_vault(vault);
        Ok(())
    }

    fn asgard_vaults(&self) -> CustodyResult<Vec<Vault>> {
        let state = self.state.read();
        Ok(state
            .asgard_index
            .iter()
            .filter_map(|pk| state.vaults.get(pk).cloned())
            .collect())
    }

    fn asgard_vaults_by_status(&self, status: VaultStatus) -> CustodyResult<Vec<Vault>> {
        Ok(self
            .asgard_vaults()?
            .into_iter()
            .filter(|v| v.status == status)
            .collect())
    }

    fn remove_from_asgard_index(&self, pk: &PubKey) -> CustodyResult<()> {
        self.state.write().asgard_index.retain(|k| k != pk);
        Ok(())
    }

    fn get_node_account(&self, addr: &NodeAddress) -> CustodyResult<NodeAccount> {
        self.state
            .read()
            .nodes
            .get(addr)
            .cloned()
            .ok_or_else(|| CustodyError::NodeNotFound {
                node: addr.to_string(),
            })
    }

    fn get_node_account_by_pub_key(&self, pk: &PubKey) -> CustodyResult<NodeAccount> {
        self.state
            .read()
            .nodes
            .values()
            .find(|n| n.signer_pub_key == *pk)
            .cloned()
            .ok_or_else(|| CustodyError::NodeNotFound {
                node: pk.to_string(),
            })
    }

    fn set_node_account(&self, node: NodeAccount) -> CustodyResult<()> {
        self.state.write().nodes.insert(node.node_address, node);
        Ok(())
    }

    fn list_active_validators(&self) -> CustodyResult<Vec<NodeAccount>> {
        Ok(self
            .state
            .read()
            .nodes
            .values()
            .filter(|n| n.status == NodeStatus::Active)
            .cloned()
            .collect())
    }

    fn list_bonded_nodes(&self) -> CustodyResult<Vec<NodeAccount>> {
        Ok(self
            .state
            .read()
            .nodes
            .values()
            .filter(|n| n.bond > 0)
            .cloned()
            .collect())
    }

    fn slash_points(&self, addr: &NodeAddress) -> u64 {
        self.state
            .read()
            .slash_points
            .get(addr)
            .copied()
            .unwrap_or(0)
    }

    fn inc_slash_points(&self, addr: &NodeAddress, points: u64) -> CustodyResult<()> {
        let mut state = self.state.write();
        let entry = state.slash_points.entry(*addr).or_insert(0);
        *entry = entry.saturating_add(points);
        Ok(())
    }

    fn dec_slash_points(&self, addr: &NodeAddress, points: u64) -> CustodyResult<()> {
        let mut state = self.state.write();
        let entry = state.slash_points.entry(*addr).or_insert(0);
        *entry = entry.saturating_sub(points);
        Ok(())
    }

    fn get_pool(&self, asset: &Asset) -> CustodyResult<Pool> {
        self.state
            .read()
            .pools
            .get(&asset.to_string())
            .cloned()
            .ok_or_else(|| CustodyError::PoolNotFound {
                asset: asset.clone(),
            })
    }

    fn pool_exists(&self, asset: &Asset) -> bool {
        self.state.read().pools.contains_key(&asset.to_string())
    }

    fn set_pool(&self, pool: Pool) -> CustodyResult<()> {
        self.state.write().pools.insert(pool.asset.to_string(), pool);
        Ok(())
    }

    fn remove_pool(&self, asset: &Asset) -> CustodyResult<()> {
        self.state.write().pools.remove(&asset.to_string());
        Ok(())
    }

    fn pools_page(&self, request: PageRequest) -> CustodyResult<Page<Pool>> {
        Ok(page_after(&self.state.read().pools, &request))
    }

    fn liquidity_providers_page(
        &self,
        asset: &Asset,
        request: PageRequest,
    ) -> CustodyResult<Page<LiquidityProvider>> {
        let state = self.state.read();
        Ok(match state.positions.get(&asset.to_string()) {
            Some(positions) => page_after(positions, &request),
            None => Page::last(Vec::new()),
        })
    }

    fn remove_liquidity_provider(&self, lp: &LiquidityProvider) -> CustodyResult<()> {
        let mut state = self.state.write();
        if let Some(positions) = state.positions.get_mut(&lp.asset.to_string()) {
            positions.remove(&lp.key());
        }
        Ok(())
    }

    fn pool_ragnarok_start(&self, asset: &Asset) -> CustodyResult<Option<u64>> {
        Ok(self.state.read().ragnarok_starts.get(asset).copied())
    }

    fn set_pool_ragnarok_start(&self, asset: &Asset, height: u64) -> CustodyResult<()> {
        self.state
            .write()
            .ragnarok_starts
            .insert(asset.clone(), height);
        Ok(())
    }

    fn get_keygen_block(&self, height: u64) -> CustodyResult<Option<KeygenBlock>> {
        Ok(self.state.read().keygen_blocks.get(&height).cloned())
    }

    fn set_keygen_block(&self, block: KeygenBlock) -> CustodyResult<()> {
        self.state.write().keygen_blocks.insert(block.height, block);
        Ok(())
    }

    fn get_keygen_voter(&self, id: &CeremonyId) -> CustodyResult<Option<KeygenVoter>> {
        Ok(self.state.read().keygen_voters.get(id).cloned())
    }

    fn set_keygen_voter(&self, voter: KeygenVoter) -> CustodyResult<()> {
        self.state.write().keygen_voters.insert(voter.id, voter);
        Ok(())
    }

    fn pending_keygen_voters(&self) -> CustodyResult<Vec<KeygenVoter>> {
        Ok(self
            .state
            .read()
            .keygen_voters
            .values()
            .filter(|v| v.majority_consensus_height.is_some() && v.block_height.is_none())
            .cloned()
            .collect())
    }

    fn get_keysign_fail_voter(&self, id: &CeremonyId) -> CustodyResult<Option<KeysignFailVoter>> {
        Ok(self.state.read().keysign_fail_voters.get(id).cloned())
    }

    fn set_keysign_fail_voter(&self, voter: KeysignFailVoter) -> CustodyResult<()> {
        self.state
            .write()
            .keysign_fail_voters
            .insert(voter.id, voter);
        Ok(())
    }

    fn get_observed_tx_voter(&self, tx_id: &TxId) -> CustodyResult<Option<ObservedTxVoter>> {
        Ok(self.state.read().observed.get(tx_id).cloned())
    }

    fn set_observed_tx_voter(&self, voter: ObservedTxVoter) -> CustodyResult<()> {
        self.state.write().observed.insert(voter.tx_id, voter);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<StateOperation>) -> CustodyResult<()> {
        let mut state = self.state.write();
        for op in operations {
            match op {
                StateOperation::PutVault(vault) => state.put_vault(vault),
                StateOperation::PutNode(node) => {
                    state.nodes.insert(node.node_address, node);
                }
                StateOperation::RemoveFromAsgardIndex(pk) => {
                    state.asgard_index.retain(|k| *k != pk);
                }
            }
        }
        Ok(())
    }
}
