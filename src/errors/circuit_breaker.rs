//! Consecutive-failure circuit breaker

use tracing::{error, info};

/// Trips after `threshold` consecutive failed transactions. A breaker built
/// with `None` never trips.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    threshold: Option<u32>,
    consecutive_errors: u32,
    is_open: bool,
}

impl CircuitBreaker {
    pub fn new(threshold: Option<u32>) -> Self {
        Self {
            threshold: threshold.filter(|t| *t > 0),
            consecutive_errors: 0,
            is_open: false,
        }
    }

    pub fn record_success(&mut self) {
        if self.consecutive_errors > 0 {
            info!("Failure streak of {} cleared", self.consecutive_errors);
        }
        self.consecutive_errors = 0;
        self.is_open = false;
    }

    /// Returns true when this failure opened the breaker.
    pub fn record_error(&mut self) -> bool {
        self.consecutive_errors += 1;

        match self.threshold {
            Some(limit) if !self.is_open && self.consecutive_errors >= limit => {
                self.is_open = true;
                error!(
                    "Circuit breaker OPEN after {} consecutive failed transactions",
                    self.consecutive_errors
                );
                true
            }
            _ => false,
        }
    }

    #[cfg(test)]
    pub fn can_proceed(&self) -> bool {
        !self.is_open
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }
}
