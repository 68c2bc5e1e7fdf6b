//! Reconciling outbounds observed on external chains.

use shared_types::{safe_sub, Coin};
use tracing::{info, warn};

use super::CustodyService;
use crate::domain::{Memo, TxOutItem};
use crate::error::CustodyResult;
use crate::ports::inbound::ObservedOutbound;

impl CustodyService {
    /// Match `obs` against its queued instruction, debit the vault and slash
    /// anything spent beyond what was authorised.
    pub(crate) fn reconcile_outbound(&self, height: u64, obs: ObservedOutbound) -> CustodyResult<()> {
        let mut vault = self.store.get_vault(&obs.vault_pub_key)?;
        let mut tx_out = self.outbound.get_tx_out(obs.scheduled_height)?;

        let mut excess = Vec::new();
        match tx_out.items.iter().position(|item| matches_observation(item, &obs)) {
            Some(idx) => {
                let item = &mut tx_out.items[idx];
                item.out_hash = Some(obs.tx_id);
                excess.extend(overspend(item, &obs));
                let in_hash = item.real_in_hash();
                self.outbound.set_tx_out(tx_out)?;
                vault.remove_pending_tx_block_height(obs.scheduled_height);

                if let Some(in_hash) = in_hash {
                    if let Some(mut voter) = self.store.get_observed_tx_voter(&in_hash)? {
                        if !voter.out_txs.contains(&obs.tx_id) {
                            voter.out_txs.push(obs.tx_id);
                            self.store.set_observed_tx_voter(voter)?;
                        }
                    }
                }
            }
            None => {
                warn!(vault = %obs.vault_pub_key, tx = %obs.tx_id, "[qc-18] outbound without matching instruction");
                excess.extend(obs.coins.iter().cloned());
                excess.extend(obs.gas.iter().cloned());
            }
        }

        vault.sub_funds(&obs.coins);
        vault.sub_funds(&obs.gas);
        vault.outbound_tx_count += 1;
        self.store.set_vault(vault)?;

        if matches!(obs.memo, Memo::Migrate { .. } | Memo::YggdrasilReturn { .. }) {
            let destination = self
                .store
                .asgard_vaults()?
                .into_iter()
                .find(|v| v.pub_key.address_for(obs.chain) == obs.to_address);
            if let Some(mut destination) = destination {
                destination.add_funds(&obs.coins);
                info!(vault = %destination.pub_key, tx = %obs.tx_id, "[qc-18] internal transfer credited");
                self.store.set_vault(destination)?;
            }
        }

        excess.retain(|c| !c.is_empty());
        if excess.is_empty() {
            return Ok(());
        }
        warn!(vault = %obs.vault_pub_key, tx = %obs.tx_id, coins = excess.len(), "[qc-18] vault overspent, slashing");
        self.slash_vault_overspend(height, &obs.vault_pub_key, &excess)
    }
}

fn matches_observation(item: &TxOutItem, obs: &ObservedOutbound) -> bool {
    if !item.is_pending()
        || item.vault_pub_key != obs.vault_pub_key
        || item.chain != obs.chain
        || item.to_address != obs.to_address
        || item.memo != obs.memo
    {
        return false;
    }
    // a recall carries a placeholder coin and returns whatever the vault holds
    matches!(item.memo, Memo::YggdrasilReturn { .. })
        || obs.coins.iter().any(|c| c.asset == item.coin.asset)
}

/// Coins and gas in `obs` beyond what `item` authorised.
fn overspend(item: &TxOutItem, obs: &ObservedOutbound) -> Vec<Coin> {
    let mut excess = Vec::new();
    if !matches!(item.memo, Memo::YggdrasilReturn { .. }) {
        for coin in &obs.coins {
            if coin.asset == item.coin.asset {
                let over = safe_sub(coin.amount, item.coin.amount);
                if over > 0 {
                    excess.push(Coin::new(coin.asset.clone(), over));
                }
            } else {
                excess.push(coin.clone());
            }
        }
    }
    for gas in &obs.gas {
        let allowed = item
            .max_gas
            .iter()
            .filter(|g| g.asset == gas.asset)
            .fold(0u128, |acc, g| acc.saturating_add(g.amount));
        let over = safe_sub(gas.amount, allowed);
        if over > 0 {
            excess.push(Coin::new(gas.asset.clone(), over));
        }
    }
    excess
}
