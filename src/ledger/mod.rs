//! Transaction history and running statistics

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use tracing::debug;

use crate::{
    config::{HISTORY_CAPACITY, NATIVE_DECIMALS},
    errors::{BotError, BotResult},
    execution::SwapOutcome,
    types::*,
    utils::from_base_units,
};

#[derive(Debug)]
pub struct TransactionLedger {
    history: VecDeque<TransactionRecord>,
    capacity: usize,
    stats: LedgerStats,
    gas_samples: u32,
}

impl Default for TransactionLedger {
    fn default() -> Self {
        Self::new(HISTORY_CAPACITY)
    }
}

impl TransactionLedger {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            stats: LedgerStats::default(),
            gas_samples: 0,
        }
    }

    /// Starts a new run: counters go back to zero, history is kept.
    pub fn begin_run(&mut self) {
        self.stats = LedgerStats::default();
        self.gas_samples = 0;
    }

    /// Appends a pending record, evicting the oldest beyond capacity.
    pub fn record(&mut self, record: TransactionRecord) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.stats.attempts += 1;
        self.history.push_back(record);
    }

    /// Finalizes a pending record exactly once and folds it into the stats.
    /// `volume` is the configured per-transaction amount credited on success.
    pub fn complete(&mut self, id: &str, outcome: &SwapOutcome, volume: Decimal) -> BotResult<TransactionRecord> {
        let record = self
            .history
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| BotError::UnknownRecord { id: id.to_string() })?;

        let gas_cost = from_base_units(outcome.gas_cost, NATIVE_DECIMALS);
        if outcome.success {
            record.mark_success(outcome.tx_hash, gas_cost)?;
        } else {
            let cause = outcome.failure.unwrap_or(FailureCause::Other);
            let message = outcome.error.clone().unwrap_or_else(|| cause.to_string());
            let paid = (!outcome.gas_cost.is_zero()).then_some(gas_cost);
            record.mark_failed(cause, message, outcome.tx_hash, paid)?;
        }
        let finalized = record.clone();

        let stats = &mut self.stats;
        stats.completed += 1;
        if outcome.success {
            stats.successes += 1;
            stats.total_volume += volume;
        } else {
            stats.failures += 1;
        }
        stats.success_rate = Decimal::from(stats.successes) * dec!(100) / Decimal::from(stats.completed);

        if gas_cost > Decimal::ZERO {
            stats.average_gas_cost = if stats.average_gas_cost.is_zero() {
                gas_cost
            } else {
                (stats.average_gas_cost + gas_cost) / dec!(2)
            };
            stats.total_gas_cost += gas_cost;
            self.gas_samples += 1;
            stats.mean_gas_cost = stats.total_gas_cost / Decimal::from(self.gas_samples);
        }

        debug!(
            id = %finalized.id,
            status = ?finalized.status(),
            completed = stats.completed,
            "Transaction finalized"
        );
        Ok(finalized)
    }

    pub fn stats(&self) -> &LedgerStats {
        &self.stats
    }

    /// Oldest first.
    pub fn history(&self) -> Vec<TransactionRecord> {
        self.history.iter().cloned().collect()
    }
}
