//! Volume Bot - automated buy/sell volume generation for EVM tokens
//!
//! Discovers liquidity for a token across Uniswap-style exchanges on Base,
//! then alternates slippage-protected buys and sells from one bot wallet or a
//! pool of derived wallets until a transaction target or budget is reached.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod pools;
pub mod execution;
pub mod wallets;
pub mod scheduler;
pub mod ledger;
pub mod utils;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used items
pub use config::{BotConfiguration, Settings, SETTINGS};
pub use errors::{BotError, BotResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
