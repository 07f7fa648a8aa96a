//! Transaction records and ledger statistics

use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use crate::errors::{BotError, BotResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

/// Why a swap attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    InsufficientFunds,
    NoViableRouter,
    ApprovalFailed,
    Reverted,
    Provider,
    Other,
}

impl From<&BotError> for FailureCause {
    fn from(error: &BotError) -> Self {
        match error {
            BotError::InsufficientFunds { .. } => Self::InsufficientFunds,
            BotError::NoRoute { .. } | BotError::Liquidity { .. } => Self::NoViableRouter,
            BotError::Approval { .. } => Self::ApprovalFailed,
            BotError::Transaction { .. } => Self::Reverted,
            BotError::Provider { .. } => Self::Provider,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InsufficientFunds => "insufficient funds",
            Self::NoViableRouter => "no viable router",
            Self::ApprovalFailed => "approval failed",
            Self::Reverted => "swap reverted",
            Self::Provider => "provider unavailable",
            Self::Other => "error",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: String,
    pub direction: Direction,
    /// Native amount for buys, token amount sold for sells.
    pub amount: Decimal,
    pub exchange_id: String,
    pub wallet: Address,
    status: TransactionStatus,
    pub tx_hash: Option<B256>,
    /// Gas paid, in native units.
    pub gas_cost: Option<Decimal>,
    pub failure: Option<FailureCause>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn pending(
        direction: Direction,
        amount: Decimal,
        exchange_id: impl Into<String>,
        wallet: Address,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            direction,
            amount,
            exchange_id: exchange_id.into(),
            wallet,
            status: TransactionStatus::Pending,
            tx_hash: None,
            gas_cost: None,
            failure: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn is_final(&self) -> bool {
        self.status != TransactionStatus::Pending
    }

    pub fn mark_success(&mut self, tx_hash: Option<B256>, gas_cost: Decimal) -> BotResult<()> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Success;
        self.tx_hash = tx_hash;
        self.gas_cost = Some(gas_cost);
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        cause: FailureCause,
        message: impl Into<String>,
        tx_hash: Option<B256>,
        gas_cost: Option<Decimal>,
    ) -> BotResult<()> {
        self.ensure_pending()?;
        self.status = TransactionStatus::Failed;
        self.failure = Some(cause);
        self.error_message = Some(message.into());
        self.tx_hash = tx_hash;
        self.gas_cost = gas_cost;
        Ok(())
    }

    fn ensure_pending(&self) -> BotResult<()> {
        if self.is_final() {
            return Err(BotError::RecordFinalized {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Running statistics derived by the ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    /// Sum of the configured per-transaction amount over successes.
    pub total_volume: Decimal,
    pub completed: u32,
    pub attempts: u32,
    pub successes: u32,
    pub failures: u32,
    /// Percentage in [0, 100].
    pub success_rate: Decimal,
    /// Running pairwise average: each new cost is averaged with the previous
    /// figure.
    pub average_gas_cost: Decimal,
    pub mean_gas_cost: Decimal,
    pub total_gas_cost: Decimal,
}
