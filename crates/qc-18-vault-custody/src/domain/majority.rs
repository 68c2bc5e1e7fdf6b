//! Vote thresholds.

use serde::{Deserialize, Serialize};

/// A vote threshold expressed as `numerator / denominator` of the eligible set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    /// The network's standard supermajority.
    pub const TWO_THIRDS: Ratio = Ratio {
        numerator: 2,
        denominator: 3,
    };

    pub const THREE_HALVES: Ratio = Ratio {
        numerator: 3,
        denominator: 2,
    };

    /// True when `signers` of `total` meets this ratio.
    ///
    /// More signers than eligible members never counts as met.
    pub fn is_met(&self, signers: usize, total: usize) -> bool {
        if total == 0 || signers > total || self.denominator == 0 {
            return false;
        }
        (signers as u128) * u128::from(self.denominator)
            >= (total as u128) * u128::from(self.numerator)
    }

    /// Smallest signer count out of `total` that meets this ratio.
    pub fn threshold(&self, total: usize) -> usize {
        if self.denominator == 0 {
            return total;
        }
        let num = (total as u128) * u128::from(self.numerator);
        let den = u128::from(self.denominator);
        num.div_ceil(den) as usize
    }

    /// `amount * numerator / denominator`, saturating.
    pub fn apply(&self, amount: u128) -> u128 {
        if self.denominator == 0 {
            return 0;
        }
        shared_types::get_uncapped_share(
            u128::from(self.numerator),
            u128::from(self.denominator),
            amount,
        )
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::TWO_THIRDS
    }
}

/// Two-thirds of `total`.
pub fn has_super_majority(signers: usize, total: usize) -> bool {
    Ratio::TWO_THIRDS.is_met(signers, total)
}

/// At least half of `total`.
pub fn has_simple_majority(signers: usize, total: usize) -> bool {
    Ratio {
        numerator: 1,
        denominator: 2,
    }
    .is_met(signers, total)
}
