//! Fixed gas schedule.

use std::collections::BTreeMap;

use shared_types::{Chain, Coin};

use crate::error::CustodyResult;
use crate::ports::outbound::GasOracle;

/// Gas oracle returning preconfigured values; unset chains cost nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticGasOracle {
    max_gas: BTreeMap<Chain, u128>,
    gas_rate: BTreeMap<Chain, u64>,
}

impl StaticGasOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_gas(mut self, chain: Chain, amount: u128) -> Self {
        self.max_gas.insert(chain, amount);
        self
    }

    pub fn with_gas_rate(mut self, chain: Chain, rate: u64) -> Self {
        self.gas_rate.insert(chain, rate);
        self
    }
}

impl GasOracle for StaticGasOracle {
    fn max_gas(&self, chain: Chain) -> CustodyResult<Coin> {
        let amount = self.max_gas.get(&chain).copied().unwrap_or(0);
        Ok(Coin::new(chain.gas_asset(), amount))
    }

    fn gas_rate(&self, chain: Chain) -> u64 {
        self.gas_rate.get(&chain).copied().unwrap_or(0)
    }
}
