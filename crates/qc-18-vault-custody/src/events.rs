//! Outgoing events.
//!
//! Emitted for external indexers. Correctness never depends on them; a
//! failed emission is logged and processing continues.

use serde::{Deserialize, Serialize};
use shared_types::{Asset, Chain, Coin, NodeAddress, PubKey};

use crate::domain::{PoolStatus, VaultStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustodyEvent {
    VaultStatusChanged {
        pub_key: PubKey,
        status: VaultStatus,
        height: u64,
    },
    VaultFrozen {
        pub_key: PubKey,
        chains: Vec<Chain>,
    },
    PoolStatusChanged {
        asset: Asset,
        status: PoolStatus,
    },
    /// Non-gas pool deleted once its last position was withdrawn.
    PoolRemoved {
        asset: Asset,
    },
    PoolBalanceChanged {
        asset: Asset,
        rune_added: u128,
        asset_removed: u128,
        reason: String,
    },
    /// Pool adjusted after a vault overspent.
    Slash {
        asset: Asset,
        asset_removed: u128,
        rune_added: u128,
    },
    BondSlashed {
        node: NodeAddress,
        amount: u128,
        reason: String,
    },
    SlashPoints {
        node: NodeAddress,
        points: u64,
        reason: String,
    },
    NodeJailed {
        node: NodeAddress,
        release_height: u64,
        reason: String,
    },
    PolicySet {
        key: String,
        value: i64,
    },
    KeygenRequested {
        height: u64,
        members: Vec<PubKey>,
    },
    KeygenCompleted {
        pool_pub_key: PubKey,
        members: Vec<PubKey>,
    },
    KeygenFailed {
        blamed: Vec<PubKey>,
    },
    MigrationScheduled {
        from: PubKey,
        to: PubKey,
        coin: Coin,
    },
    RecallScheduled {
        chain: Chain,
        yggdrasil: PubKey,
    },
}
