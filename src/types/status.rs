//! Bot lifecycle state and presentation snapshots

use serde::Serialize;
use std::fmt;

use super::{LedgerStats, TransactionRecord, WalletView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BotStatus {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl BotStatus {
    /// The lifecycle graph. `Running -> Idle` is only taken by the loop when
    /// the transaction target is met.
    pub fn can_transition_to(self, next: BotStatus) -> bool {
        use BotStatus::*;
        matches!(
            (self, next),
            (Idle, Running)
                | (Running, Paused)
                | (Running, Stopped)
                | (Running, Idle)
                | (Paused, Running)
                | (Paused, Stopped)
                | (Stopped, Idle)
        )
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Everything the presentation layer may display.
#[derive(Debug, Clone, Serialize)]
pub struct BotSnapshot {
    pub status: BotStatus,
    pub completed: u32,
    pub target: u32,
    pub stats: LedgerStats,
    pub history: Vec<TransactionRecord>,
    pub wallets: Vec<WalletView>,
    pub last_error: Option<String>,
}

impl BotSnapshot {
    pub fn idle() -> Self {
        Self {
            status: BotStatus::Idle,
            completed: 0,
            target: 0,
            stats: LedgerStats::default(),
            history: Vec::new(),
            wallets: Vec::new(),
            last_error: None,
        }
    }

    /// Progress in [0, 1].
    pub fn progress(&self) -> f64 {
        if self.target == 0 {
            0.0
        } else {
            (self.completed as f64 / self.target as f64).min(1.0)
        }
    }
}
