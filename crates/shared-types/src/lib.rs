//! # Shared Types Crate
//!
//! Chain primitives used across the custody subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: assets, coins and keys are defined once here.
//! - **Integer Amounts**: every amount is a `u128` in 1e8 base units; shares
//!   are computed through 256-bit intermediates (see [`math`]).
//! - **No Chain Codecs**: real per-chain address encoding lives outside the
//!   custody core, so addresses here are deterministic stand-ins.

pub mod entities;
pub mod errors;
pub mod math;

pub use entities::*;
pub use errors::*;
pub use math::*;
