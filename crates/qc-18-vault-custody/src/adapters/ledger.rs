//! In-memory ledger of named module accounts.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use shared_types::{Asset, Coin};

use crate::ports::outbound::{Ledger, LedgerError, ModuleAccount};

pub struct InMemoryLedger {
    balances: RwLock<BTreeMap<(ModuleAccount, Asset), u128>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger for InMemoryLedger {
    fn mint(&self, account: ModuleAccount, coin: &Coin) -> Result<(), LedgerError> {
        let mut balances = self.balances.write();
        let entry = balances.entry((account, coin.asset.clone())).or_insert(0);
        *entry = entry
            .checked_add(coin.amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: account.to_string(),
                asset: coin.asset.clone(),
            })?;
        Ok(())
    }

    fn transfer(
        &self,
        from: ModuleAccount,
        to: ModuleAccount,
        coins: &[Coin],
    ) -> Result<(), LedgerError> {
        let mut balances = self.balances.write();
        // validate every leg before moving anything
        let mut needed: BTreeMap<&Asset, u128> = BTreeMap::new();
        for coin in coins.iter().filter(|c| !c.is_empty()) {
            *needed.entry(&coin.asset).or_insert(0) += coin.amount;
        }
        for (asset, amount) in &needed {
            let available = balances
                .get(&(from, (*asset).clone()))
                .copied()
                .unwrap_or(0);
            if available < *amount {
                return Err(LedgerError::InsufficientBalance {
                    account: from.to_string(),
                    asset: (*asset).clone(),
                    needed: *amount,
                    available,
                });
            }
        }
        for (asset, amount) in needed {
            if let Some(bal) = balances.get_mut(&(from, asset.clone())) {
                *bal -= amount;
            }
            let dest = balances.entry((to, asset.clone())).or_insert(0);
            *dest = dest.saturating_add(amount);
        }
        Ok(())
    }

    fn balance_of(&self, account: ModuleAccount, asset: &Asset) -> u128 {
        self.balances
            .read()
            .get(&(account, asset.clone()))
            .copied()
            .unwrap_or(0)
    }

    fn total_supply(&self, asset: &Asset) -> u128 {
        self.balances
            .read()
            .iter()
            .filter(|((_, a), _)| a == asset)
            .map(|(_, amount)| *amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_is_all_or_nothing() {
        let ledger = InMemoryLedger::new();
        let rune = Asset::rune();
        let btc = shared_types::Chain::Bitcoin.gas_asset();
        ledger
            .mint(ModuleAccount::Bond, &Coin::new(rune.clone(), 100))
            .unwrap();

        let err = ledger
            .transfer(
                ModuleAccount::Bond,
                ModuleAccount::Reserve,
                &[Coin::new(rune.clone(), 50), Coin::new(btc, 1)],
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(ModuleAccount::Bond, &rune), 100);

        ledger
            .transfer(
                ModuleAccount::Bond,
                ModuleAccount::Reserve,
                &[Coin::new(rune.clone(), 60)],
            )
            .unwrap();
        assert_eq!(ledger.balance_of(ModuleAccount::Bond, &rune), 40);
        assert_eq!(ledger.balance_of(ModuleAccount::Reserve, &rune), 60);
        assert_eq!(ledger.total_supply(&rune), 100);
    }
}
