//! Slippage and gas policy math

use alloy::primitives::U256;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

use crate::{
    config::Settings,
    utils::{apply_bps_u128, apply_bps_u64},
};

const PPM: u64 = 1_000_000;

/// Quoted output reduced by `slippage_pct` percent, rounded down.
pub fn min_output_after_slippage(quote: U256, slippage_pct: Decimal) -> U256 {
    let ppm = (slippage_pct.max(Decimal::ZERO) * dec!(10_000))
        .round()
        .to_u64()
        .unwrap_or(PPM)
        .min(PPM);
    quote * U256::from(PPM - ppm) / U256::from(PPM)
}

/// Fast inclusion over cost: both gas price and gas limit are scaled up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPolicy {
    pub price_multiplier_bps: u32,
    pub limit_multiplier_bps: u32,
}

impl GasPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            price_multiplier_bps: settings.gas_price_multiplier_bps,
            limit_multiplier_bps: settings.gas_limit_multiplier_bps,
        }
    }

    pub fn gas_price(&self, network_price: u128) -> u128 {
        apply_bps_u128(network_price, self.price_multiplier_bps)
    }

    pub fn gas_limit(&self, estimate: u64) -> u64 {
        apply_bps_u64(estimate, self.limit_multiplier_bps)
    }
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}
