//! # Share Arithmetic
//!
//! Proportional splits over `u128` amounts. Products are taken in 256 bits so
//! `alloc * part / total` cannot overflow before the division.

pub use primitive_types::U256;

use crate::entities::NATIVE_DECIMALS;

fn to_u128(value: U256) -> u128 {
    if value > U256::from(u128::MAX) {
        u128::MAX
    } else {
        value.as_u128()
    }
}

/// `alloc * part / total`, with `part` capped at `total`.
///
/// Returns zero when either `part` or `total` is zero.
pub fn get_safe_share(part: u128, total: u128, alloc: u128) -> u128 {
    if part == 0 || total == 0 {
        return 0;
    }
    get_uncapped_share(part.min(total), total, alloc)
}

/// `alloc * part / total` without capping `part`; zero when `total` is zero.
pub fn get_uncapped_share(part: u128, total: u128, alloc: u128) -> u128 {
    if part == 0 || total == 0 {
        return 0;
    }
    to_u128(U256::from(alloc) * U256::from(part) / U256::from(total))
}

/// `a - b`, floored at zero.
pub fn safe_sub(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// Truncate `amount` so it is representable on a chain with `decimals` digits.
///
/// Internal amounts always carry eight decimals; chains with fewer cannot
/// express the trailing digits.
pub fn round_to_decimal(amount: u128, decimals: u8) -> u128 {
    if decimals == 0 || decimals >= NATIVE_DECIMALS {
        return amount;
    }
    let factor = 10u128.pow(u32::from(NATIVE_DECIMALS - decimals));
    amount / factor * factor
}
