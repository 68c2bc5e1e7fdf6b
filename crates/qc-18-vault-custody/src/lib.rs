//! # qc-18-vault-custody
//!
//! Vault custody subsystem for Quantum-Chain: threshold-signed vaults, their
//! rotation ("churn"), gradual fund migration, chain and pool retirement
//! ("ragnarok") and the slashing that backs all of it with bonded stake.
//!
//! ## Architecture
//!
//! Hexagonal layout. The service owns no state of its own; every record lives
//! behind an outbound port and is re-read each block, so a failed unit of work
//! is simply re-evaluated on the next block.
//!
//! ```text
//!            signer messages            block hooks
//!   (keygen / keysign / observed)   (begin_block / end_block)
//!                 │                          │
//!                 ↓                          ↓
//!        ┌──────────────────── CustodyApi ────────────────────┐
//!        │  voting ─→ churn ─→ registry                        │
//!        │  migration      ragnarok      slasher               │
//!        └───────┬──────────┬──────────┬──────────┬────────────┘
//!                ↓          ↓          ↓          ↓
//!          CustodyStore   Ledger   OutboundQueue  EventSink ...
//! ```
//!
//! Vault lifecycle:
//!
//! ```text
//! [Init] ──rotate──→ [Active] ──superseded──→ [Retiring] ──drained──→ [Inactive]
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qc_18_vault_custody::{CustodyApi, CustodyConfig, CustodyDependencies, CustodyService};
//!
//! let service = CustodyService::new(CustodyConfig::default(), deps)?;
//! service.genesis(1)?;
//! service.begin_block(2, &evidence);
//! service.end_block(2);
//! ```
//!
//! ## Failure handling
//!
//! `begin_block` and `end_block` never fail: each subsystem step is caught and
//! logged so a slashing error cannot stop migration in the same block.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod service;

pub use config::{CustodyConfig, CustodyPolicy, PolicyKey};
pub use domain::{
    Blame, ByzantineEvidence, EvidenceKind, KeygenOutcome, KeygenType, LiquidityProvider, Memo,
    NodeAccount, NodeStatus, Pool, PoolStatus, Ratio, TxOutItem, Vault, VaultStatus, VaultType,
};
pub use error::{CustodyError, CustodyResult, ErrorKind};
pub use events::CustodyEvent;
pub use ports::inbound::{
    CustodyApi, KeygenProgress, KeygenResultMsg, KeysignFailureMsg, ObservedOutbound,
};
pub use ports::outbound::{
    CustodyStore, EventSink, GasOracle, Ledger, LedgerError, LiquidityWithdrawer, ModuleAccount,
    OutboundQueue, PolicyStore, StateOperation,
};
pub use service::{CustodyDependencies, CustodyService};
