//! Process-level settings and environment variable handling

use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::types::BASE_CHAIN_ID;

// Gas policy (basis points, 10_000 = 1.0x)
pub const DEFAULT_GAS_PRICE_MULTIPLIER_BPS: u32 = 12_000;
pub const DEFAULT_GAS_LIMIT_MULTIPLIER_BPS: u32 = 12_000;
pub const MAX_GAS_MULTIPLIER_BPS: u32 = 30_000;

// Trade Execution Constants
pub const CONFIRMATION_TIMEOUT_SECS: u64 = 120;
pub const SWAP_DEADLINE_SECS: u64 = 1_200;
pub const NATIVE_DECIMALS: u8 = 18;
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

pub const HISTORY_CAPACITY: usize = 50;
pub const MAX_DERIVED_WALLETS: u32 = 50;

pub const DEFAULT_WALLET_STORE_PATH: &str = "output/wallets/bot_wallet.json";

#[derive(Debug, Clone)]
pub struct Settings {
    pub rpc_url: Option<String>,
    pub chain_id: u64,
    /// The user's primary wallet, used only to fund bot wallets.
    pub user_private_key: Option<String>,
    pub wallet_store_path: String,
    pub exchanges_file: Option<String>,
    pub gas_price_multiplier_bps: u32,
    pub gas_limit_multiplier_bps: u32,
    pub confirmation_timeout_secs: u64,
    pub persist_transactions: bool,
    /// Native moved from the user wallet into the bot wallet at startup.
    pub fund_amount: Option<Decimal>,
    /// Native split across derived wallets at startup, paid by the bot wallet.
    pub pool_fund_amount: Option<Decimal>,
    /// Return everything to the user wallet on shutdown.
    pub withdraw_on_exit: bool,
}

impl Settings {
    pub fn load() -> Self {
        let rpc_url = env::var("RPC_URL").ok().or_else(|| {
            env::var("ALCHEMY_API_KEY")
                .ok()
                .map(|key| format!("https://base-mainnet.g.alchemy.com/v2/{}", key))
        });

        Self {
            rpc_url,
            chain_id: env::var("CHAIN_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(BASE_CHAIN_ID),
            user_private_key: env::var("USER_PRIVATE_KEY").ok(),
            wallet_store_path: env::var("BOT_WALLET_PATH")
                .unwrap_or_else(|_| DEFAULT_WALLET_STORE_PATH.to_string()),
            exchanges_file: env::var("EXCHANGES_FILE").ok(),
            gas_price_multiplier_bps: env::var("GAS_PRICE_MULTIPLIER_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_PRICE_MULTIPLIER_BPS)
                .clamp(10_000, MAX_GAS_MULTIPLIER_BPS),
            gas_limit_multiplier_bps: env::var("GAS_LIMIT_MULTIPLIER_BPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_GAS_LIMIT_MULTIPLIER_BPS)
                .clamp(10_000, MAX_GAS_MULTIPLIER_BPS),
            confirmation_timeout_secs: env::var("CONFIRMATION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(CONFIRMATION_TIMEOUT_SECS)
                .max(5),
            persist_transactions: env::var("PERSIST_TRANSACTIONS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            fund_amount: env_decimal("FUND_AMOUNT"),
            pool_fund_amount: env_decimal("POOL_FUND_AMOUNT"),
            withdraw_on_exit: env::var("WITHDRAW_ON_EXIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: None,
            chain_id: BASE_CHAIN_ID,
            user_private_key: None,
            wallet_store_path: DEFAULT_WALLET_STORE_PATH.to_string(),
            exchanges_file: None,
            gas_price_multiplier_bps: DEFAULT_GAS_PRICE_MULTIPLIER_BPS,
            gas_limit_multiplier_bps: DEFAULT_GAS_LIMIT_MULTIPLIER_BPS,
            confirmation_timeout_secs: CONFIRMATION_TIMEOUT_SECS,
            persist_transactions: false,
            fund_amount: None,
            pool_fund_amount: None,
            withdraw_on_exit: false,
        }
    }
}

fn env_decimal(var: &str) -> Option<Decimal> {
    env::var(var)
        .ok()
        .and_then(|s| Decimal::from_str(s.trim()).ok())
        .filter(|d| *d > Decimal::ZERO)
}
