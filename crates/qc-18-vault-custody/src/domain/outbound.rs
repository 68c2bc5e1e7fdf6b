//! Outbound instructions.
//!
//! The custody core never signs or broadcasts. It queues [`TxOutItem`]s for
//! the external signer and later reconciles what was observed on-chain.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::{Chain, Coin, PubKey, TxId};

/// Purpose of an outbound instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Memo {
    /// Payout for a user inbound.
    Outbound { in_hash: TxId },
    Refund { in_hash: TxId },
    /// Vault-to-vault transfer during churn.
    Migrate { height: u64 },
    YggdrasilFund { height: u64 },
    /// Recall of a per-node vault's funds.
    YggdrasilReturn { height: u64 },
    Consolidate,
    /// Forced liquidity withdrawal while a pool or chain is retired.
    Ragnarok { height: u64 },
}

impl Memo {
    /// Vault-management transfers; rescheduling leaves these to their own engines.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Memo::Migrate { .. }
                | Memo::YggdrasilFund { .. }
                | Memo::YggdrasilReturn { .. }
                | Memo::Consolidate
        )
    }

    pub fn is_ragnarok(&self) -> bool {
        matches!(self, Memo::Ragnarok { .. })
    }
}

impl fmt::Display for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Memo::Outbound { in_hash } => write!(f, "OUT:{in_hash}"),
            Memo::Refund { in_hash } => write!(f, "REFUND:{in_hash}"),
            Memo::Migrate { height } => write!(f, "MIGRATE:{height}"),
            Memo::YggdrasilFund { height } => write!(f, "YGGDRASIL+:{height}"),
            Memo::YggdrasilReturn { height } => write!(f, "YGGDRASIL-:{height}"),
            Memo::Consolidate => f.write_str("CONSOLIDATE"),
            Memo::Ragnarok { height } => write!(f, "RAGNAROK:{height}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutItem {
    pub chain: Chain,
    pub to_address: String,
    pub vault_pub_key: PubKey,
    pub coin: Coin,
    pub memo: Memo,
    /// Most the signer may spend on fees.
    pub max_gas: Vec<Coin>,
    pub gas_rate: u64,
    /// Inbound this instruction answers, when there is one.
    pub in_hash: Option<TxId>,
    /// Set once the outbound is observed, or to [`TxId::BLANK`] when
    /// the instruction was handed to another vault.
    pub out_hash: Option<TxId>,
}

impl TxOutItem {
    pub fn new(chain: Chain, to_address: String, coin: Coin, memo: Memo) -> Self {
        Self {
            chain,
            to_address,
            vault_pub_key: PubKey::EMPTY,
            coin,
            memo,
            max_gas: Vec::new(),
            gas_rate: 0,
            in_hash: None,
            out_hash: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.out_hash.is_none()
    }

    /// An inbound hash that refers to a real transaction.
    pub fn real_in_hash(&self) -> Option<TxId> {
        self.in_hash.filter(|h| !h.is_blank())
    }
}

/// Outbound instructions queued at one height.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub height: u64,
    pub items: Vec<TxOutItem>,
}

impl TxOut {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            items: Vec::new(),
        }
    }
}
