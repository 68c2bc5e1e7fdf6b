//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Everything the custody core reads or writes outside its own memory goes
//! through one of these traits. All calls are synchronous: block processing
//! is strictly sequential and never suspends.

use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::{Asset, Chain, Coin, NodeAddress, PubKey, TxId};
use thiserror::Error;

use crate::config::PolicyKey;
use crate::domain::{
    CeremonyId, KeygenBlock, KeygenVoter, KeysignFailVoter, LiquidityProvider, NodeAccount,
    ObservedTxVoter, Page, PageRequest, Pool, TxOut, TxOutItem, Vault, VaultStatus,
};
use crate::error::CustodyResult;
use crate::events::CustodyEvent;

// =============================================================================
// LEDGER FACADE
// =============================================================================

/// Named custody accounts held by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModuleAccount {
    Module,
    /// Node bonds.
    Bond,
    /// System reserve.
    Reserve,
    /// Pooled liquidity backing asgard vaults.
    Asgard,
}

impl fmt::Display for ModuleAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleAccount::Module => "custody",
            ModuleAccount::Bond => "bond",
            ModuleAccount::Reserve => "reserve",
            ModuleAccount::Asgard => "asgard",
        };
        f.write_str(s)
    }
}

/// Ledger failures. Transfers are all-or-nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Insufficient balance in {account}: need {needed} {asset}, have {available}")]
    InsufficientBalance {
        account: String,
        asset: Asset,
        needed: u128,
        available: u128,
    },

    #[error("Balance overflow in {account} for {asset}")]
    Overflow { account: String, asset: Asset },

    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// Balance and transfer primitives over named accounts.
pub trait Ledger: Send + Sync {
    fn mint(&self, account: ModuleAccount, coin: &Coin) -> Result<(), LedgerError>;

    /// Move `coins` atomically; nothing moves if any leg would go negative.
    fn transfer(
        &self,
        from: ModuleAccount,
        to: ModuleAccount,
        coins: &[Coin],
    ) -> Result<(), LedgerError>;

    fn balance_of(&self, account: ModuleAccount, asset: &Asset) -> u128;

    /// Circulating supply of `asset` across all accounts.
    fn total_supply(&self, asset: &Asset) -> u128;
}

// =============================================================================
// STATE STORE
// =============================================================================

/// One write in an atomic batch.
#[derive(Debug, Clone)]
pub enum StateOperation {
    PutVault(Vault),
    PutNode(NodeAccount),
    RemoveFromAsgardIndex(PubKey),
}

/// Persistent custody state.
///
/// Lookups of single records return a not-found error when absent; optional
/// records return `Ok(None)`.
pub trait CustodyStore: Send + Sync {
    // --- vaults ---
    fn get_vault(&self, pk: &PubKey) -> CustodyResult<Vault>;
    fn vault_exists(&self, pk: &PubKey) -> bool;
    /// Saving an asgard vault also adds it to the asgard index.
    fn set_vault(&self, vault: Vault) -> CustodyResult<()>;
    /// Asgard vaults in the index, in insertion order.
    fn asgard_vaults(&self) -> CustodyResult<Vec<Vault>>;
    fn asgard_vaults_by_status(&self, status: VaultStatus) -> CustodyResult<Vec<Vault>>;
    /// Drop from the index; the vault record remains.
    fn remove_from_asgard_index(&self, pk: &PubKey) -> CustodyResult<()>;

    // --- node accounts ---
    fn get_node_account(&self, addr: &NodeAddress) -> CustodyResult<NodeAccount>;
    fn get_node_account_by_pub_key(&self, pk: &PubKey) -> CustodyResult<NodeAccount>;
    fn set_node_account(&self, node: NodeAccount) -> CustodyResult<()>;
    fn list_active_validators(&self) -> CustodyResult<Vec<NodeAccount>>;
    /// Nodes with a positive bond, in any status.
    fn list_bonded_nodes(&self) -> CustodyResult<Vec<NodeAccount>>;
    fn slash_points(&self, addr: &NodeAddress) -> u64;
    fn inc_slash_points(&self, addr: &NodeAddress, points: u64) -> CustodyResult<()>;
    /// Floors at zero.
    fn dec_slash_points(&self, addr: &NodeAddress, points: u64) -> CustodyResult<()>;

    // --- pools and positions ---
    fn get_pool(&self, asset: &Asset) -> CustodyResult<Pool>;
    fn pool_exists(&self, asset: &Asset) -> bool;
    fn set_pool(&self, pool: Pool) -> CustodyResult<()>;
    fn remove_pool(&self, asset: &Asset) -> CustodyResult<()>;
    fn pools_page(&self, request: PageRequest) -> CustodyResult<Page<Pool>>;
    fn liquidity_providers_page(
        &self,
        asset: &Asset,
        request: PageRequest,
    ) -> CustodyResult<Page<LiquidityProvider>>;
    fn remove_liquidity_provider(&self, lp: &LiquidityProvider) -> CustodyResult<()>;
    fn pool_ragnarok_start(&self, asset: &Asset) -> CustodyResult<Option<u64>>;
    fn set_pool_ragnarok_start(&self, asset: &Asset, height: u64) -> CustodyResult<()>;

    // --- ceremonies ---
    fn get_keygen_block(&self, height: u64) -> CustodyResult<Option<KeygenBlock>>;
    fn set_keygen_block(&self, block: KeygenBlock) -> CustodyResult<()>;
    fn get_keygen_voter(&self, id: &CeremonyId) -> CustodyResult<Option<KeygenVoter>>;
    fn set_keygen_voter(&self, voter: KeygenVoter) -> CustodyResult<()>;
    /// Voters that reached a majority but whose outcome was never applied.
    fn pending_keygen_voters(&self) -> CustodyResult<Vec<KeygenVoter>>;
    fn get_keysign_fail_voter(&self, id: &CeremonyId) -> CustodyResult<Option<KeysignFailVoter>>;
    fn set_keysign_fail_voter(&self, voter: KeysignFailVoter) -> CustodyResult<()>;

    // --- observations ---
    fn get_observed_tx_voter(&self, tx_id: &TxId) -> CustodyResult<Option<ObservedTxVoter>>;
    fn set_observed_tx_voter(&self, voter: ObservedTxVoter) -> CustodyResult<()>;

    /// Apply every operation or none.
    fn atomic_batch_write(&self, operations: Vec<StateOperation>) -> CustodyResult<()>;
}

// =============================================================================
// POLICY, OUTBOUND, GAS, LIQUIDITY, EVENTS
// =============================================================================

/// Administrative key-value overrides.
pub trait PolicyStore: Send + Sync {
    fn get(&self, key: &PolicyKey) -> CustodyResult<Option<i64>>;
    fn set(&self, key: PolicyKey, value: i64) -> CustodyResult<()>;
}

/// Queue consumed by the external signer.
pub trait OutboundQueue: Send + Sync {
    /// Validate and queue. Fails with `NotEnoughToPayFee` when the coin
    /// cannot cover its own gas.
    fn try_add_tx_out_item(&self, height: u64, item: TxOutItem) -> CustodyResult<bool>;

    /// Queue without validation (rescheduled items were validated once).
    fn unsafe_add_tx_out_item(&self, height: u64, item: TxOutItem) -> CustodyResult<()>;

    fn get_tx_out(&self, height: u64) -> CustodyResult<TxOut>;
    fn set_tx_out(&self, tx_out: TxOut) -> CustodyResult<()>;
}

/// Current fee conditions per chain.
pub trait GasOracle: Send + Sync {
    /// Most a single outbound on `chain` may spend on fees.
    fn max_gas(&self, chain: Chain) -> CustodyResult<Coin>;
    fn gas_rate(&self, chain: Chain) -> u64;
}

/// Executes a full withdrawal of a liquidity position.
///
/// Pool pricing belongs to the AMM; the custody core only synthesizes the
/// instruction and reacts to failure.
pub trait LiquidityWithdrawer: Send + Sync {
    fn withdraw(
        &self,
        height: u64,
        lp: &LiquidityProvider,
        basis_points: u64,
        withdraw_asset: &Asset,
    ) -> CustodyResult<()>;
}

/// Structured notifications for indexers.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CustodyEvent) -> CustodyResult<()>;
}
