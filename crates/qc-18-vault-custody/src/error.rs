//! Error types for the vault custody subsystem.

use shared_types::{Asset, Chain, PubKey};
use thiserror::Error;

use crate::ports::outbound::LedgerError;

/// Broad category of a custody failure.
///
/// Callers use the category to decide between skip-and-log and abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A vault, pool, node or record is missing.
    NotFound,
    /// The request contradicts recorded state and was rejected untouched.
    InvariantViolation,
    /// Funds or fees do not cover the instruction.
    InsufficientFunds,
    /// A ledger or store call failed; re-evaluated on a later block.
    External,
    /// Bootstrap cannot continue; the host decides whether to shut down.
    CannotProceed,
}

/// Vault custody errors.
#[derive(Debug, Error)]
pub enum CustodyError {
    #[error("Vault not found: {pubkey}")]
    VaultNotFound { pubkey: PubKey },

    #[error("Pool not found: {asset}")]
    PoolNotFound { asset: Asset },

    #[error("Node account not found: {node}")]
    NodeNotFound { node: String },

    #[error("No keygen block at height {height}")]
    KeygenBlockNotFound { height: u64 },

    #[error("No active asgard vaults")]
    NoActiveVaults,

    #[error("No active node accounts")]
    NoActiveNodes,

    /// A later ceremony submission disagrees with the recorded result.
    #[error("Ceremony result mismatch: recorded {recorded}, submitted {submitted}")]
    ResultMismatch { recorded: String, submitted: String },

    #[error("Active vault {pubkey} already has identical membership")]
    DuplicateMembership { pubkey: PubKey },

    #[error("Signer {signer} not authorized: {reason}")]
    Unauthorized { signer: String, reason: String },

    #[error("Ceremony at height {ceremony_height} is stale at height {current_height}")]
    StaleCeremony {
        ceremony_height: u64,
        current_height: u64,
    },

    #[error("Blame cast too wide: {blamed} of {active} active nodes blamed")]
    BlameTooWide { blamed: usize, active: usize },

    #[error("Cannot ragnarok the native chain {chain}")]
    NativeChainRagnarok { chain: Chain },

    #[error("Invalid vault transition for {pubkey}: {reason}")]
    InvalidTransition { pubkey: PubKey, reason: String },

    #[error("Insufficient funds in {holder}: need {needed} {asset}, have {available}")]
    InsufficientFunds {
        holder: String,
        asset: Asset,
        needed: u128,
        available: u128,
    },

    #[error("Not enough to pay fee: {amount} {asset} below gas {gas}")]
    NotEnoughToPayFee {
        asset: Asset,
        amount: u128,
        gas: u128,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Cannot proceed: {reason}")]
    CannotProceed { reason: String },
}

impl CustodyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CustodyError::VaultNotFound { .. }
            | CustodyError::PoolNotFound { .. }
            | CustodyError::NodeNotFound { .. }
            | CustodyError::KeygenBlockNotFound { .. }
            | CustodyError::NoActiveVaults
            | CustodyError::NoActiveNodes => ErrorKind::NotFound,
            CustodyError::ResultMismatch { .. }
            | CustodyError::DuplicateMembership { .. }
            | CustodyError::Unauthorized { .. }
            | CustodyError::StaleCeremony { .. }
            | CustodyError::BlameTooWide { .. }
            | CustodyError::NativeChainRagnarok { .. }
            | CustodyError::InvalidTransition { .. } => ErrorKind::InvariantViolation,
            CustodyError::InsufficientFunds { .. } | CustodyError::NotEnoughToPayFee { .. } => {
                ErrorKind::InsufficientFunds
            }
            CustodyError::Ledger(_) | CustodyError::Store(_) => ErrorKind::External,
            CustodyError::CannotProceed { .. } => ErrorKind::CannotProceed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result type for custody operations.
pub type CustodyResult<T> = Result<T, CustodyError>;
