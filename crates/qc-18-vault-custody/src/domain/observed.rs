//! Observation records for inbound and outbound transactions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use shared_types::{NodeAddress, PubKey, TxId};

use super::outbound::TxOutItem;

/// One version of an observed transaction and the nodes that attested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTx {
    pub tx_id: TxId,
    pub signers: Vec<NodeAddress>,
}

/// Aggregated observations of a single external transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedTxVoter {
    pub tx_id: TxId,
    /// Height the observation first reached consensus.
    pub height: u64,
    /// Height the observation was finalised on the external chain; 0 if not yet.
    pub finalised_height: u64,
    pub txs: Vec<ObservedTx>,
    /// Outbounds scheduled in response.
    pub actions: Vec<TxOutItem>,
    /// Outbounds already observed for those actions.
    pub out_txs: Vec<TxId>,
}

impl ObservedTxVoter {
    pub fn new(tx_id: TxId, height: u64) -> Self {
        Self {
            tx_id,
            height,
            finalised_height: 0,
            txs: Vec::new(),
            actions: Vec::new(),
            out_txs: Vec::new(),
        }
    }

    /// Every node that attested any version of the transaction.
    pub fn all_signers(&self) -> BTreeSet<NodeAddress> {
        self.txs
            .iter()
            .flat_map(|tx| tx.signers.iter().copied())
            .collect()
    }

    pub fn reference_height(&self) -> u64 {
        if self.finalised_height > 0 {
            self.finalised_height
        } else {
            self.height
        }
    }

    /// All scheduled actions have been observed going out.
    pub fn is_done(&self) -> bool {
        !self.actions.is_empty() && self.out_txs.len() >= self.actions.len()
    }

    /// Point the action matching `item` at `vault`.
    pub fn reassign_action(&mut self, item: &TxOutItem, vault: PubKey) {
        for action in self.actions.iter_mut() {
            if action.chain == item.chain
                && action.to_address == item.to_address
                && action.coin == item.coin
            {
                action.vault_pub_key = vault;
            }
        }
    }
}
