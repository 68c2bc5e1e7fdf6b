//! # Custody Metrics
//!
//! Prometheus counters for custody activity.
//!
//! Enable with the `metrics` feature:
//! ```toml
//! qc-18-vault-custody = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `custody_vaults_rotated_total` - Vaults promoted to active
//! - `custody_keygen_outcomes_total` - Applied keygen outcomes (by result)
//! - `custody_migration_txs_total` - Migration instructions queued
//! - `custody_dust_burned_total` - Residual balances written off
//! - `custody_positions_withdrawn_total` - Liquidity positions force-withdrawn
//! - `custody_bond_slashed_total` - RUNE taken from bonds (by reason)
//! - `custody_slash_points_total` - Slash points assessed (by reason)

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref VAULTS_ROTATED: IntCounter = register_int_counter!(
        "custody_vaults_rotated_total",
        "Total number of vaults promoted to active"
    )
    .expect("Failed to create VAULTS_ROTATED metric");

    pub static ref KEYGEN_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "custody_keygen_outcomes_total",
        "Applied keygen ceremony outcomes",
        &["result"]
    )
    .expect("Failed to create KEYGEN_OUTCOMES metric");

    pub static ref MIGRATION_TXS: IntCounter = register_int_counter!(
        "custody_migration_txs_total",
        "Total migration instructions queued"
    )
    .expect("Failed to create MIGRATION_TXS metric");

    pub static ref DUST_BURNED: IntCounter = register_int_counter!(
        "custody_dust_burned_total",
        "Residual vault balances written off"
    )
    .expect("Failed to create DUST_BURNED metric");

    pub static ref POSITIONS_WITHDRAWN: IntCounter = register_int_counter!(
        "custody_positions_withdrawn_total",
        "Liquidity positions force-withdrawn by ragnarok"
    )
    .expect("Failed to create POSITIONS_WITHDRAWN metric");

    pub static ref BOND_SLASHED: IntCounterVec = register_int_counter_vec!(
        "custody_bond_slashed_total",
        "RUNE base units slashed from bonds",
        &["reason"]
    )
    .expect("Failed to create BOND_SLASHED metric");

    pub static ref SLASH_POINTS: IntCounterVec = register_int_counter_vec!(
        "custody_slash_points_total",
        "Slash points assessed",
        &["reason"]
    )
    .expect("Failed to create SLASH_POINTS metric");
}

#[cfg(feature = "metrics")]
pub fn record_vault_rotated() {
    VAULTS_ROTATED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_keygen_outcome(result: &str) {
    KEYGEN_OUTCOMES.with_label_values(&[result]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_migration_tx() {
    MIGRATION_TXS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_dust_burned() {
    DUST_BURNED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_position_withdrawn() {
    POSITIONS_WITHDRAWN.inc();
}

/// Counter is u64; larger amounts saturate.
#[cfg(feature = "metrics")]
pub fn record_bond_slashed(reason: &str, amount: u128) {
    let amount = u64::try_from(amount).unwrap_or(u64::MAX);
    BOND_SLASHED.with_label_values(&[reason]).inc_by(amount);
}

#[cfg(feature = "metrics")]
pub fn record_slash_points(reason: &str, points: u64) {
    SLASH_POINTS.with_label_values(&[reason]).inc_by(points);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_vault_rotated() {}

#[cfg(not(feature = "metrics"))]
pub fn record_keygen_outcome(_result: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_migration_tx() {}

#[cfg(not(feature = "metrics"))]
pub fn record_dust_burned() {}

#[cfg(not(feature = "metrics"))]
pub fn record_position_withdrawn() {}

#[cfg(not(feature = "metrics"))]
pub fn record_bond_slashed(_reason: &str, _amount: u128) {}

#[cfg(not(feature = "metrics"))]
pub fn record_slash_points(_reason: &str, _points: u64) {}
