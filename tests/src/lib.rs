//! # Quantum-Chain Test Suite
//!
//! Multi-block scenarios driving the vault custody subsystem through its
//! public API only.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # In-memory network, tracing setup
//!     ├── churn_flow.rs      # genesis → keygen → rotation
//!     ├── migration_flow.rs  # retiring vault drained over rounds
//!     ├── ragnarok_flow.rs   # chain and pool retirement
//!     └── slashing_flow.rs   # evidence, keysign failure, overspend
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # With subsystem logs
//! RUST_LOG=qc_18_vault_custody=debug cargo test -p qc-tests -- --nocapture
//! ```

#![allow(dead_code)]

pub mod integration;
