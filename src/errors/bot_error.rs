//! Custom error types for the bot

use alloy::primitives::{Address, B256, U256};
use thiserror::Error;

use crate::types::{Asset, BotStatus};

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("No liquidity for {token} on any selected exchange: {details}")]
    Liquidity { token: Address, details: String },

    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientFunds {
        asset: Asset,
        required: U256,
        available: U256,
    },

    #[error("No viable router on {exchange}: {reason}")]
    NoRoute { exchange: String, reason: String },

    #[error("Approval of {token} failed: {message}")]
    Approval { token: Address, message: String },

    #[error("Transaction failed: {message}")]
    Transaction {
        tx_hash: Option<B256>,
        message: String,
    },

    #[error("Provider error: {message}")]
    Provider {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: BotStatus, to: BotStatus },

    #[error("Transaction record {id} is already final")]
    RecordFinalized { id: String },

    #[error("No pending transaction record {id}")]
    UnknownRecord { id: String },

    #[error("Wallet storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Failed to derive wallet #{index}: {message}")]
    KeyDerivation { index: u32, message: String },

    #[error("Circuit breaker active: {reason}")]
    CircuitBreakerOpen { reason: String },
}

impl BotError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Wraps a failed RPC call. Callers treat this as "temporarily
    /// unavailable", never as a negative answer.
    pub fn provider(context: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Provider {
            message: context.into(),
            source: Some(source),
            retry_count: 0,
        }
    }

    #[cfg(test)]
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

pub type BotResult<T> = Result<T, BotError>;
