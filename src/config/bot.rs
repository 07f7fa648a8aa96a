//! Trading parameters for one bot instance

use alloy::primitives::Address;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

use super::MAX_DERIVED_WALLETS;
use crate::errors::{BotError, BotResult};

pub const MIN_SLIPPAGE_PCT: Decimal = dec!(0.01);
pub const MAX_SLIPPAGE_PCT: Decimal = dec!(50);
pub const DEFAULT_SLIPPAGE_PCT: Decimal = dec!(1);

#[derive(Debug, Clone, PartialEq)]
pub struct BotConfiguration {
    pub token: Option<Address>,
    /// Pool to trust for the token, verified before use.
    pub pool_address: Option<Address>,
    /// Native amount spent by each buy.
    pub amount_per_tx: Decimal,
    pub total_budget: Decimal,
    pub tx_count: u32,
    pub interval_min_secs: u64,
    pub interval_max_secs: u64,
    buy_ratio: u8,
    pub slippage_pct: Decimal,
    pub exchanges: Vec<String>,
    pub multi_wallet: bool,
    pub wallet_count: u32,
    /// Stop after this many failed transactions in a row. `None` disables.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for BotConfiguration {
    fn default() -> Self {
        Self {
            token: None,
            pool_address: None,
            amount_per_tx: dec!(0.001),
            total_budget: dec!(0.1),
            tx_count: 10,
            interval_min_secs: 30,
            interval_max_secs: 120,
            buy_ratio: 50,
            slippage_pct: DEFAULT_SLIPPAGE_PCT,
            exchanges: vec!["uniswap".to_string()],
            multi_wallet: false,
            wallet_count: 0,
            max_consecutive_failures: None,
        }
    }
}

impl BotConfiguration {
    pub fn from_env() -> BotResult<Self> {
        let mut config = Self::default();

        if let Ok(token) = env::var("TOKEN_ADDRESS") {
            config.token = Some(parse_address("TOKEN_ADDRESS", &token)?);
        }
        if let Ok(pool) = env::var("POOL_ADDRESS") {
            config.pool_address = Some(parse_address("POOL_ADDRESS", &pool)?);
        }
        if let Some(amount) = env_decimal("AMOUNT_PER_TX") {
            config.amount_per_tx = amount;
        }
        if let Some(budget) = env_decimal("TOTAL_BUDGET") {
            config.total_budget = budget;
        }
        config.tx_count = env_parse("TX_COUNT").unwrap_or(config.tx_count);
        config.interval_min_secs = env_parse("INTERVAL_MIN_SECS").unwrap_or(config.interval_min_secs);
        config.interval_max_secs = env_parse("INTERVAL_MAX_SECS").unwrap_or(config.interval_max_secs);
        if let Some(ratio) = env_parse::<u8>("BUY_RATIO") {
            config.set_buy_ratio(ratio)?;
        }
        if let Some(slippage) = env_decimal("SLIPPAGE_PCT") {
            config.slippage_pct = slippage;
        }
        if let Ok(list) = env::var("EXCHANGES") {
            config.exchanges = list
                .split(',')
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config.multi_wallet = env_parse("MULTI_WALLET").unwrap_or(false);
        config.wallet_count = env_parse("WALLET_COUNT").unwrap_or(0);
        config.max_consecutive_failures = env_parse("MAX_CONSECUTIVE_FAILURES");

        Ok(config)
    }

    pub fn buy_ratio(&self) -> u8 {
        self.buy_ratio
    }

    pub fn sell_ratio(&self) -> u8 {
        100 - self.buy_ratio
    }

    /// The sell ratio always follows as `100 - buy_ratio`.
    pub fn set_buy_ratio(&mut self, buy_ratio: u8) -> BotResult<()> {
        if buy_ratio > 100 {
            return Err(BotError::config(format!(
                "buy ratio must be within 0..=100, got {}",
                buy_ratio
            )));
        }
        self.buy_ratio = buy_ratio;
        Ok(())
    }

    pub fn set_ratios(&mut self, buy_ratio: u8, sell_ratio: u8) -> BotResult<()> {
        if buy_ratio as u16 + sell_ratio as u16 != 100 {
            return Err(BotError::config(format!(
                "buy ratio {} and sell ratio {} must sum to 100",
                buy_ratio, sell_ratio
            )));
        }
        self.set_buy_ratio(buy_ratio)
    }

    /// Checks everything `start` needs that does not require the chain.
    pub fn validate(&self) -> BotResult<()> {
        if self.token.is_none() {
            return Err(BotError::config("no token selected"));
        }
        if self.amount_per_tx <= Decimal::ZERO {
            return Err(BotError::config("amount per transaction must be positive"));
        }
        if self.total_budget < self.amount_per_tx {
            return Err(BotError::config(format!(
                "total budget {} is below the per-transaction amount {}",
                self.total_budget, self.amount_per_tx
            )));
        }
        if self.tx_count == 0 {
            return Err(BotError::config("transaction count must be at least 1"));
        }
        if self.interval_min_secs > self.interval_max_secs {
            return Err(BotError::config(format!(
                "interval bounds inverted: {}s > {}s",
                self.interval_min_secs, self.interval_max_secs
            )));
        }
        if self.slippage_pct < MIN_SLIPPAGE_PCT || self.slippage_pct > MAX_SLIPPAGE_PCT {
            return Err(BotError::config(format!(
                "slippage {}% outside [{}%, {}%]",
                self.slippage_pct, MIN_SLIPPAGE_PCT, MAX_SLIPPAGE_PCT
            )));
        }
        if self.exchanges.is_empty() {
            return Err(BotError::config("no exchange selected"));
        }
        if self.multi_wallet && (self.wallet_count == 0 || self.wallet_count > MAX_DERIVED_WALLETS) {
            return Err(BotError::config(format!(
                "multi-wallet mode needs 1..={} wallets, got {}",
                MAX_DERIVED_WALLETS, self.wallet_count
            )));
        }
        Ok(())
    }

    pub fn token(&self) -> BotResult<Address> {
        self.token.ok_or_else(|| BotError::config("no token selected"))
    }
}

fn parse_address(var: &str, value: &str) -> BotResult<Address> {
    Address::from_str(value.trim())
        .map_err(|e| BotError::config(format!("{} is not an address: {}", var, e)))
}

fn env_decimal(var: &str) -> Option<Decimal> {
    env::var(var).ok().and_then(|s| Decimal::from_str(s.trim()).ok())
}

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|s| s.trim().parse().ok())
}
