//! Driving Ports (API - Inbound)
//!
//! Entry points the block processor calls. Messages from signer nodes
//! arrive already authenticated; `signer` is the sending node's address.

use shared_types::{Chain, Coin, NodeAddress, PubKey, TxId};

use crate::domain::{Blame, ByzantineEvidence, KeygenOutcome, KeygenType, Memo, Vault};
use crate::error::CustodyResult;

/// Outcome report for a keygen ceremony.
#[derive(Clone, Debug)]
pub struct KeygenResultMsg {
    /// Height the ceremony was requested at.
    pub height: u64,
    pub keygen_type: KeygenType,
    /// Participants of the ceremony.
    pub members: Vec<PubKey>,
    pub outcome: KeygenOutcome,
    /// Chains the reporting node supports.
    pub chains: Vec<Chain>,
    pub signer: NodeAddress,
}

/// Report that a signing attempt failed.
#[derive(Clone, Debug)]
pub struct KeysignFailureMsg {
    /// Height the outbound was scheduled at.
    pub height: u64,
    pub vault_pub_key: PubKey,
    pub memo: String,
    pub coins: Vec<Coin>,
    pub blame: Blame,
    pub signer: NodeAddress,
}

/// An outbound transaction observed on an external chain.
#[derive(Clone, Debug)]
pub struct ObservedOutbound {
    pub tx_id: TxId,
    pub chain: Chain,
    pub vault_pub_key: PubKey,
    pub to_address: String,
    pub coins: Vec<Coin>,
    /// Fees the vault actually paid.
    pub gas: Vec<Coin>,
    pub memo: Memo,
    /// Height at which the instruction being fulfilled was queued.
    pub scheduled_height: u64,
}

/// Result of applying a keygen report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeygenProgress {
    /// Report recorded; not enough agreement yet.
    Pending,
    /// Duplicate or non-member report; nothing changed.
    Ignored,
    /// Supermajority reached; waiting for stragglers.
    AwaitingStragglers,
    /// Successful ceremony applied; the new vault was saved in `Init`.
    VaultCreated(PubKey),
    /// Failed ceremony applied; blamed nodes were penalised.
    Failed { blamed: Vec<PubKey> },
    /// Report arrived after the outcome was applied.
    AlreadyFinalised,
}

/// Primary custody API.
pub trait CustodyApi {
    /// Bootstrap the first vault. Fails with `CannotProceed` when no active
    /// node exists.
    fn genesis(&self, height: u64) -> CustodyResult<()>;

    /// Evidence-driven slashing for the block.
    fn begin_block(&self, height: u64, evidence: &[ByzantineEvidence]);

    /// Migration, chain and pool retirement, and lag-driven slashing.
    fn end_block(&self, height: u64);

    fn trigger_keygen(&self, height: u64, members: Vec<PubKey>) -> CustodyResult<()>;

    fn rotate_vault(&self, height: u64, vault: Vault) -> CustodyResult<()>;

    fn process_keygen_result(
        &self,
        height: u64,
        msg: KeygenResultMsg,
    ) -> CustodyResult<KeygenProgress>;

    /// Returns true once the failure reached consensus and was penalised.
    fn process_keysign_failure(&self, height: u64, msg: KeysignFailureMsg) -> CustodyResult<bool>;

    fn record_outbound_observed(&self, height: u64, observed: ObservedOutbound)
        -> CustodyResult<()>;

    fn slash_vault(&self, height: u64, vault: &PubKey, coins: &[Coin]) -> CustodyResult<()>;

    fn handle_double_sign(
        &self,
        height: u64,
        cons_address: &NodeAddress,
        infraction_height: u64,
    ) -> CustodyResult<()>;

    fn lack_observing(&self, height: u64) -> CustodyResult<()>;

    fn lack_signing(&self, height: u64) -> CustodyResult<()>;
}
