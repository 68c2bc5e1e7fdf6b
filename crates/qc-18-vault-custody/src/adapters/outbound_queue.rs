//! In-memory outbound queue, keyed by height.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::domain::{Memo, TxOut, TxOutItem};
use crate::error::{CustodyError, CustodyResult};
use crate::ports::outbound::OutboundQueue;

pub struct InMemoryOutboundQueue {
    tx_outs: RwLock<BTreeMap<u64, TxOut>>,
}

impl InMemoryOutboundQueue {
    pub fn new() -> Self {
        Self {
            tx_outs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Every queued item across all heights.
    pub fn all_items(&self) -> Vec<TxOutItem> {
        self.tx_outs
            .read()
            .values()
            .flat_map(|t| t.items.iter().cloned())
            .collect()
    }
}

impl Default for InMemoryOutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue for InMemoryOutboundQueue {
    fn try_add_tx_out_item(&self, height: u64, item: TxOutItem) -> CustodyResult<bool> {
        // recalls carry a zero coin; everything else must move something
        if item.coin.is_empty() && !matches!(item.memo, Memo::YggdrasilReturn { .. }) {
            return Ok(false);
        }
        if item.coin.asset.is_gas_asset() {
            let gas: u128 = item
                .max_gas
                .iter()
                .filter(|g| g.asset == item.coin.asset)
                .map(|g| g.amount)
                .sum();
            if !item.coin.is_empty() && item.coin.amount <= gas {
                return Err(CustodyError::NotEnoughToPayFee {
                    asset: item.coin.asset.clone(),
                    amount: item.coin.amount,
                    gas,
                });
            }
        }
        self.unsafe_add_tx_out_item(height, item)?;
        Ok(true)
    }

    fn unsafe_add_tx_out_item(&self, height: u64, item: TxOutItem) -> CustodyResult<()> {
        self.tx_outs
            .write()
            .entry(height)
            .or_insert_with(|| TxOut::new(height))
            .items
            .push(item);
        Ok(())
    }

    fn get_tx_out(&self, height: u64) -> CustodyResult<TxOut> {
        Ok(self
            .tx_outs
            .read()
            .get(&height)
            .cloned()
            .unwrap_or_else(|| TxOut::new(height)))
    }

    fn set_tx_out(&self, tx_out: TxOut) -> CustodyResult<()> {
        self.tx_outs.write().insert(tx_out.height, tx_out);
        Ok(())
    }
}
