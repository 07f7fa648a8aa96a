//! Inter-cycle delay that can be cut short from the control surface

use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerResult {
    Elapsed,
    Cancelled,
}

/// The waiting side. Owned by the scheduling loop; only one delay is ever
/// pending.
pub struct CancellableTimer {
    epoch: watch::Receiver<u64>,
}

/// The cancelling side, held by the controller.
#[derive(Clone)]
pub struct TimerCanceller {
    epoch: watch::Sender<u64>,
}

pub fn cancellable_timer() -> (CancellableTimer, TimerCanceller) {
    let (tx, rx) = watch::channel(0);
    (CancellableTimer { epoch: rx }, TimerCanceller { epoch: tx })
}

impl CancellableTimer {
    /// Forgets cancellations issued so far.
    pub fn arm(&mut self) {
        self.epoch.borrow_and_update();
    }

    /// Returns `Cancelled` at once if `cancel` ran since the last `arm`, even
    /// when nothing was waiting at the time.
    pub async fn sleep(&mut self, duration: Duration) -> TimerResult {
        tokio::select! {
            biased;
            _ = self.epoch.changed() => TimerResult::Cancelled,
            _ = tokio::time::sleep(duration) => TimerResult::Elapsed,
        }
    }
}

impl TimerCanceller {
    /// Wakes a pending `sleep`. A no-op when nothing is waiting.
    pub fn cancel(&self) {
        self.epoch.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }
}
