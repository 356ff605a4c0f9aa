//! Deadline scheduling for warning and expiry fires.
//!
//! One scheduled cycle is a single spawned task that sleeps to the warning
//! deadline, emits a fire, then sleeps to the expiry deadline and emits the
//! second. A single task guarantees the warning is observed before expiry
//! even when both deadlines coincide (zero warning lead).
//!
//! Every fire carries the epoch it was scheduled under. Rescheduling or
//! cancelling bumps the epoch, so a fire that was already queued when its
//! cycle was superseded is provably inert: consumers drop fires whose epoch
//! is no longer current.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace};

/// Which deadline a fire corresponds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireKind {
    Warning,
    Expiry,
}

/// A timer fire delivered to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFire {
    pub kind: FireKind,
    /// Epoch the fire was scheduled under; stale when it no longer matches
    /// the engine's current epoch.
    pub epoch: u64,
}

/// Schedules the warning and expiry fires for one idle cycle.
#[derive(Debug)]
pub struct TimerEngine {
    fires: mpsc::UnboundedSender<TimerFire>,
    epoch: u64,
    expire_at: Option<Instant>,
    task: Option<JoinHandle<()>>,
}

impl TimerEngine {
    /// Create an engine that delivers fires on the given channel.
    pub fn new(fires: mpsc::UnboundedSender<TimerFire>) -> Self {
        Self {
            fires,
            epoch: 0,
            expire_at: None,
            task: None,
        }
    }

    /// Schedule the warning fire at `baseline + timeout - warning_lead` and
    /// the expiry fire at `baseline + timeout`, cancelling any pending cycle.
    ///
    /// A baseline already further in the past than `timeout` (host suspended,
    /// timers coalesced) makes both deadlines immediately due: the fires are
    /// emitted on the next scheduler tick rather than never. Late is treated
    /// as expired, not as still active.
    pub fn schedule(&mut self, baseline: Instant, timeout: Duration, warning_lead: Duration) {
        self.cancel();

        let expire_at = baseline + timeout;
        let warning_at = expire_at - warning_lead;
        let epoch = self.epoch;
        self.expire_at = Some(expire_at);

        trace!(
            "Scheduling epoch {}: warning in {:?}, expiry in {:?}",
            epoch,
            warning_at.saturating_duration_since(Instant::now()),
            expire_at.saturating_duration_since(Instant::now())
        );

        let fires = self.fires.clone();
        self.task = Some(tokio::spawn(async move {
            sleep_until(warning_at).await;
            // Receiver gone means the monitor is shutting down
            let _ = fires.send(TimerFire {
                kind: FireKind::Warning,
                epoch,
            });

            sleep_until(expire_at).await;
            let _ = fires.send(TimerFire {
                kind: FireKind::Expiry,
                epoch,
            });
        }));
    }

    /// Cancel any pending cycle.
    ///
    /// The task is aborted and the epoch bumped, so a fire that already made
    /// it into the channel is dropped by the epoch check on receipt.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            debug!("Cancelling timer cycle (epoch {})", self.epoch);
            task.abort();
        }
        self.epoch += 1;
        self.expire_at = None;
    }

    /// Whether a fire's epoch matches the current cycle.
    pub fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    /// Current scheduling epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Expiry instant of the pending cycle, if one is scheduled.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expire_at
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
