//! Gradual migration of funds out of retiring vaults.
//!
//! Every `fund_migration_interval` blocks each retiring vault sends a growing
//! share of each coin to an active vault: `nth / churn_migrate_rounds` on round
//! `nth`, the whole balance once the rounds are used up. Gas-asset dust that
//! can no longer pay for its own transfer is written off against the pool.

use shared_types::{get_safe_share, round_to_decimal, safe_sub, Asset, Coin, TxId};
use tracing::{debug, error, info};

use super::CustodyService;
use crate::domain::{Memo, TxOutItem, Vault, VaultStatus};
use crate::error::{CustodyError, CustodyResult};
use crate::events::CustodyEvent;
use crate::metrics;
use crate::ports::outbound::ModuleAccount;

impl CustodyService {
    pub(crate) fn migrate_funds(&self, height: u64) -> CustodyResult<()> {
        let mut active = self.store.asgard_vaults_by_status(VaultStatus::Active)?;
        if active.is_empty() {
            return Ok(());
        }
        self.ensure_routers(&mut active);

        let retiring = self.store.asgard_vaults_by_status(VaultStatus::Retiring)?;
        let period = self.policy.signing_transaction_period();
        if let Some(busy) = retiring
            .iter()
            .find(|v| v.has_pending_tx_within(height, period))
        {
            info!(vault = %busy.pub_key, "[qc-18] skipping migration, retiring vault has unsigned outbounds");
            return Ok(());
        }

        let interval = self.policy.fund_migration_interval();
        for mut vault in retiring {
            if !vault.has_funds() {
                vault.update_status(VaultStatus::Inactive, height);
                let pub_key = vault.pub_key;
                self.store.set_vault(vault)?;
                info!(vault = %pub_key, "[qc-18] retiring vault drained, now inactive");
                self.emit(CustodyEvent::VaultStatusChanged {
                    pub_key,
                    status: VaultStatus::Inactive,
                    height,
                });
                continue;
            }

            let elapsed = height.saturating_sub(vault.status_since);
            if elapsed % interval != 0 {
                continue;
            }
            let nth = elapsed / interval + 1;
            let coins = vault.coins.clone();
            for coin in &coins {
                if let Err(e) = self.migrate_coin(height, &mut vault, &active, coin, nth) {
                    error!(vault = %vault.pub_key, asset = %coin.asset, error = %e, "[qc-18] fail to migrate coin");
                }
            }
        }
        Ok(())
    }

    /// Queue round `nth` of `coin`'s migration out of `vault`.
    fn migrate_coin(
        &self,
        height: u64,
        vault: &mut Vault,
        active: &[Vault],
        coin: &Coin,
        nth: u64,
    ) -> CustodyResult<()> {
        if coin.is_empty() || coin.asset.is_native() {
            return Ok(());
        }

        // a gas asset goes to a vault without it first so each vault can pay fees
        let target = if coin.asset.is_gas_asset() {
            match active.iter().find(|v| !v.has_asset(&coin.asset)) {
                Some(v) => Some(v.clone()),
                None => self.most_secure(active, height),
            }
        } else {
            self.most_secure(active, height)
        };
        let Some(target) = target else {
            return Err(CustodyError::NoActiveVaults);
        };
        if target.pub_key == vault.pub_key {
            return Ok(());
        }

        let rounds = self.policy.churn_migrate_rounds();
        let mut amount = coin.amount;
        if nth < rounds {
            amount = get_safe_share(u128::from(nth), u128::from(rounds), coin.amount);
        }
        amount = round_to_decimal(amount, coin.decimals);

        let chain = coin.asset.chain;
        let max_gas = self.gas.max_gas(chain)?;
        if coin.asset.is_gas_asset() {
            if safe_sub(coin.amount, amount) <= max_gas.amount {
                amount = coin.amount;
            }
            let reserve = max_gas
                .amount
                .saturating_mul(vault.coin_length_by_chain(chain));
            amount = safe_sub(amount, reserve);
            if amount == 0 {
                if nth > rounds {
                    return self.burn_dust(height, vault, &coin.asset);
                }
                return Ok(());
            }
        }

        let migrated = Coin::new(coin.asset.clone(), amount).with_decimals(coin.decimals);
        let mut item = TxOutItem::new(
            chain,
            target.pub_key.address_for(chain),
            migrated.clone(),
            Memo::Migrate { height },
        );
        item.vault_pub_key = vault.pub_key;
        item.in_hash = Some(TxId::BLANK);
        item.max_gas = vec![max_gas];
        item.gas_rate = self.gas.gas_rate(chain);

        match self.outbound.try_add_tx_out_item(height, item) {
            Ok(true) => {
                vault.append_pending_tx_block_height(height, self.policy.signing_transaction_period());
                self.store.set_vault(vault.clone())?;
                info!(from = %vault.pub_key, to = %target.pub_key, coin = %migrated, nth, "[qc-18] migration scheduled");
                metrics::record_migration_tx();
                self.emit(CustodyEvent::MigrationScheduled {
                    from: vault.pub_key,
                    to: target.pub_key,
                    coin: migrated,
                });
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e @ CustodyError::NotEnoughToPayFee { .. }) => {
                debug!(vault = %vault.pub_key, error = %e, "[qc-18] migration cannot cover its fee");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Write off a gas-asset balance that cannot pay its own fee.
    ///
    /// The asset leaves both the vault and the pool; the reserve pays the
    /// equivalent RUNE to the asgard module so liquidity providers keep their
    /// value.
    fn burn_dust(&self, height: u64, vault: &mut Vault, asset: &Asset) -> CustodyResult<()> {
        let dust = vault.get_coin(asset);
        if dust.is_empty() {
            return Ok(());
        }
        let mut pool = self.store.get_pool(asset)?;
        let rune = pool.asset_value_in_rune(dust.amount);
        if rune > 0 {
            self.ledger.transfer(
                ModuleAccount::Reserve,
                ModuleAccount::Asgard,
                &[Coin::new(Asset::rune(), rune)],
            )?;
        }

        vault.sub_funds(std::slice::from_ref(&dust));
        pool.balance_asset = safe_sub(pool.balance_asset, dust.amount);
        pool.balance_rune = pool.balance_rune.saturating_add(rune);
        self.store.set_pool(pool)?;
        self.store.set_vault(vault.clone())?;

        info!(vault = %vault.pub_key, asset = %asset, amount = dust.amount, height, "[qc-18] burned dust from vault and pool");
        metrics::record_dust_burned();
        self.emit(CustodyEvent::PoolBalanceChanged {
            asset: asset.clone(),
            rune_added: rune,
            asset_removed: dust.amount,
            reason: "burn dust".to_string(),
        });
        Ok(())
    }
}
