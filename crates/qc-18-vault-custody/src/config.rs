//! # Custody Configuration
//!
//! Two layers:
//!
//! - [`CustodyConfig`]: protocol constants with sane defaults.
//! - [`CustodyPolicy`]: the constants plus administrative overrides read
//!   from a [`PolicyStore`], exposed through one typed accessor per tunable.
//!
//! Components never look up overrides by string; they call the accessor.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared_types::{Asset, Chain};
use tracing::warn;

use crate::domain::{ChainContract, Ratio};
use crate::error::{CustodyError, CustodyResult};
use crate::ports::outbound::PolicyStore;

/// Protocol constants for vault custody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyConfig {
    /// Blocks between migration rounds of a retiring vault.
    pub fund_migration_interval: u64,
    /// Rounds over which a retiring vault's balance is ramped out.
    pub churn_migrate_rounds: u64,
    /// Blocks an outbound may stay unsigned before it is rescheduled.
    pub signing_transaction_period: u64,
    /// Evidence older than this many blocks is ignored.
    pub double_sign_max_age: u64,
    /// Share of the minimum bond taken for double signing, in basis points.
    pub double_sign_slash_basis_points: u64,
    pub minimum_bond: u128,
    /// 0 disables the limit.
    pub max_outbound_attempts: u64,
    /// RUNE value of a single vault slash that halts the chain.
    pub pause_on_slash_threshold: u128,
    /// Penalty multiplier applied to the value a vault overspent.
    pub vault_slash_ratio: Ratio,
    pub supermajority: Ratio,
    pub fail_keygen_slash_points: u64,
    /// Bond taken per failed-keygen slash point from blamed non-active nodes.
    pub fail_keygen_bond_slash_per_point: u128,
    pub fail_keysign_slash_points: u64,
    pub observe_slash_points: u64,
    pub lack_of_observation_penalty: u64,
    /// Late ceremony reports within this many blocks still earn a refund.
    pub observation_delay_flexibility: u64,
    pub jail_time_keygen: u64,
    pub jail_time_keysign: u64,
    /// Keygen reports older than this are stale.
    pub churn_retry_interval: u64,
    /// Liquidity positions force-withdrawn per pool per block.
    pub ragnarok_positions_per_block: usize,
    pub chain_ragnarok_max_rounds: u64,
    /// Blocks to wait for straggling keygen reports after a supermajority.
    /// `None` waits for every member.
    pub keygen_straggler_timeout: Option<u64>,
    pub allow_wide_blame: bool,
    pub supported_chains: Vec<Chain>,
    /// Router contracts new vaults are bound to.
    pub chain_contracts: Vec<ChainContract>,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            fund_migration_interval: 360,
            churn_migrate_rounds: 5,
            signing_transaction_period: 300,
            double_sign_max_age: 24,
            double_sign_slash_basis_points: 500,
            minimum_bond: 1_000_000_00000000,
            max_outbound_attempts: 0,
            pause_on_slash_threshold: 100_00000000,
            vault_slash_ratio: Ratio::THREE_HALVES,
            supermajority: Ratio::TWO_THIRDS,
            fail_keygen_slash_points: 720,
            fail_keygen_bond_slash_per_point: 1_000_000,
            fail_keysign_slash_points: 2,
            observe_slash_points: 1,
            lack_of_observation_penalty: 2,
            observation_delay_flexibility: 10,
            jail_time_keygen: 720 * 6,
            jail_time_keysign: 60,
            churn_retry_interval: 720,
            ragnarok_positions_per_block: 200,
            chain_ragnarok_max_rounds: 10,
            keygen_straggler_timeout: None,
            allow_wide_blame: false,
            supported_chains: Chain::ALL.to_vec(),
            chain_contracts: Vec::new(),
        }
    }
}

impl CustodyConfig {
    /// Reject configurations that would divide by zero or never progress.
    pub fn validate(&self) -> CustodyResult<()> {
        let invalid = |reason: &str| {
            Err(CustodyError::CannotProceed {
                reason: format!("invalid custody config: {reason}"),
            })
        };
        if self.fund_migration_interval == 0 {
            return invalid("fund_migration_interval is zero");
        }
        if self.churn_migrate_rounds == 0 {
            return invalid("churn_migrate_rounds is zero");
        }
        if self.signing_transaction_period == 0 {
            return invalid("signing_transaction_period is zero");
        }
        if self.supermajority.denominator == 0 || self.vault_slash_ratio.denominator == 0 {
            return invalid("ratio with zero denominator");
        }
        if self.ragnarok_positions_per_block == 0 {
            return invalid("ragnarok_positions_per_block is zero");
        }
        Ok(())
    }
}

/// Administrative override keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PolicyKey {
    /// Height from which churning is halted.
    HaltChurning,
    /// Height from which a chain is halted.
    HaltChain(Chain),
    /// Height from which yggdrasil vaults receive no new funds.
    StopFundYggdrasil,
    /// Pool retirement trigger; any positive value starts ragnarok.
    RagnarokPool(Asset),
    FundMigrationInterval,
    ChurnMigrateRounds,
    SigningTransactionPeriod,
    PauseOnSlashThreshold,
    MaxOutboundAttempts,
    MinimumBond,
    AllowWideBlame,
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKey::HaltChurning => f.write_str("HALTCHURNING"),
            PolicyKey::HaltChain(chain) => write!(f, "HALT{chain}CHAIN"),
            PolicyKey::StopFundYggdrasil => f.write_str("STOPFUNDYGGDRASIL"),
            PolicyKey::RagnarokPool(asset) => write!(f, "RAGNAROK-{asset}"),
            PolicyKey::FundMigrationInterval => f.write_str("FUNDMIGRATIONINTERVAL"),
            PolicyKey::ChurnMigrateRounds => f.write_str("CHURNMIGRATEROUNDS"),
            PolicyKey::SigningTransactionPeriod => f.write_str("SIGNINGTRANSACTIONPERIOD"),
            PolicyKey::PauseOnSlashThreshold => f.write_str("PAUSEONSLASHTHRESHOLD"),
            PolicyKey::MaxOutboundAttempts => f.write_str("MAXOUTBOUNDATTEMPTS"),
            PolicyKey::MinimumBond => f.write_str("MINIMUMBONDINRUNE"),
            PolicyKey::AllowWideBlame => f.write_str("ALLOWWIDEBLAME"),
        }
    }
}

/// Configuration provider handed to every component.
#[derive(Clone)]
pub struct CustodyPolicy {
    config: CustodyConfig,
    store: Arc<dyn PolicyStore>,
}

impl CustodyPolicy {
    pub fn new(config: CustodyConfig, store: Arc<dyn PolicyStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// Override value if set and non-negative.
    fn lookup(&self, key: &PolicyKey) -> Option<u64> {
        match self.store.get(key) {
            Ok(Some(v)) if v >= 0 => Some(v as u64),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "[qc-18] policy lookup failed, using default");
                None
            }
        }
    }

    /// A height flag is raised once `0 < value <= height`.
    fn flag_raised(&self, key: &PolicyKey, height: u64) -> bool {
        self.lookup(key).is_some_and(|v| v > 0 && v <= height)
    }

    pub fn fund_migration_interval(&self) -> u64 {
        self.lookup(&PolicyKey::FundMigrationInterval)
            .filter(|v| *v > 0)
            .unwrap_or(self.config.fund_migration_interval)
    }

    pub fn churn_migrate_rounds(&self) -> u64 {
        self.lookup(&PolicyKey::ChurnMigrateRounds)
            .filter(|v| *v > 0)
            .unwrap_or(self.config.churn_migrate_rounds)
    }

    pub fn signing_transaction_period(&self) -> u64 {
        self.lookup(&PolicyKey::SigningTransactionPeriod)
            .filter(|v| *v > 0)
            .unwrap_or(self.config.signing_transaction_period)
    }

    pub fn pause_on_slash_threshold(&self) -> u128 {
        self.lookup(&PolicyKey::PauseOnSlashThreshold)
            .map(u128::from)
            .unwrap_or(self.config.pause_on_slash_threshold)
    }

    pub fn max_outbound_attempts(&self) -> u64 {
        self.lookup(&PolicyKey::MaxOutboundAttempts)
            .unwrap_or(self.config.max_outbound_attempts)
    }

    pub fn minimum_bond(&self) -> u128 {
        self.lookup(&PolicyKey::MinimumBond)
            .map(u128::from)
            .unwrap_or(self.config.minimum_bond)
    }

    pub fn allow_wide_blame(&self) -> bool {
        self.lookup(&PolicyKey::AllowWideBlame)
            .map(|v| v > 0)
            .unwrap_or(self.config.allow_wide_blame)
    }

    pub fn is_churn_halted(&self, height: u64) -> bool {
        self.flag_raised(&PolicyKey::HaltChurning, height)
    }

    pub fn is_chain_halted(&self, chain: Chain, height: u64) -> bool {
        self.flag_raised(&PolicyKey::HaltChain(chain), height)
    }

    pub fn is_pool_ragnarok_requested(&self, asset: &Asset) -> bool {
        self.lookup(&PolicyKey::RagnarokPool(asset.clone()))
            .is_some_and(|v| v >= 1)
    }

    /// Raise a height flag at `height`.
    pub fn raise(&self, key: PolicyKey, height: u64) -> CustodyResult<()> {
        let value = i64::try_from(height).map_err(|_| {
            CustodyError::Store(format!("height {height} does not fit policy value"))
        })?;
        self.store.set(key, value)
    }
}

impl fmt::Debug for CustodyPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustodyPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
