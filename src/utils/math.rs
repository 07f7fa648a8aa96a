//! Unit conversion between human amounts and on-chain integers

use alloy::primitives::U256;
use rust_decimal::prelude::*;

use crate::errors::{BotError, BotResult};

pub fn pow10_u256(n: u8) -> U256 {
    U256::from(10u64).pow(U256::from(n))
}

/// `1.5` with 18 decimals becomes `1_500_000_000_000_000_000`. Digits beyond
/// `decimals` are truncated.
pub fn to_base_units(amount: Decimal, decimals: u8) -> BotResult<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(BotError::config(format!("negative amount {}", amount)));
    }

    let amount = amount.normalize();
    let scale = amount.scale() as u8;
    let mantissa = amount.mantissa().unsigned_abs();
    let value = U256::from(mantissa);

    Ok(if scale <= decimals {
        value * pow10_u256(decimals - scale)
    } else {
        value / pow10_u256(scale - decimals)
    })
}

/// Inverse of `to_base_units`. Saturates at `Decimal::MAX` for values beyond
/// its range.
pub fn from_base_units(value: U256, decimals: u8) -> Decimal {
    let unit = pow10_u256(decimals);
    let whole = value / unit;
    let frac = value % unit;

    let whole = match u128::try_from(whole).ok().and_then(Decimal::from_u128) {
        Some(w) => w,
        None => return Decimal::MAX,
    };

    // Decimal keeps at most 28 fractional digits.
    let (frac, frac_scale) = if decimals > 28 {
        (frac / pow10_u256(decimals - 28), 28)
    } else {
        (frac, decimals as u32)
    };
    let frac = u128::try_from(frac)
        .ok()
        .and_then(|f| i128::try_from(f).ok())
        .map(|f| Decimal::from_i128_with_scale(f, frac_scale))
        .unwrap_or_default();

    whole.checked_add(frac).unwrap_or(Decimal::MAX).normalize()
}

/// Scales by `bps / 10_000`, rounding down.
pub fn apply_bps_u256(value: U256, bps: u32) -> U256 {
    value * U256::from(bps) / U256::from(10_000u32)
}

pub fn apply_bps_u128(value: u128, bps: u32) -> u128 {
    value.saturating_mul(bps as u128) / 10_000
}

pub fn apply_bps_u64(value: u64, bps: u32) -> u64 {
    ((value as u128 * bps as u128) / 10_000).min(u64::MAX as u128) as u64
}
