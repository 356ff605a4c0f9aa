//! User-activity tracking.
//!
//! Records the instant of the most recent interaction (no history) and
//! decides when that activity warrants rescheduling the idle timers.
//! Reschedules are debounced so high-frequency input (pointer movement)
//! does not thrash the timer engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Kind of user interaction that counts as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Pointer,
    Key,
    Scroll,
    Touch,
}

impl ActivityKind {
    /// All known activity kinds.
    pub const ALL: [ActivityKind; 4] = [Self::Pointer, Self::Key, Self::Scroll, Self::Touch];

    /// Get the kind as a string for logging.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pointer => "pointer",
            Self::Key => "key",
            Self::Scroll => "scroll",
            Self::Touch => "touch",
        }
    }
}

/// Decision from observing an activity event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDecision {
    /// Activity recorded; the idle timers should be rescheduled.
    Reschedule,
    /// Activity recorded, but a reschedule happened recently; the
    /// timestamp update is enough for now.
    Coalesce,
    /// Event is not tracked (wrong kind, or tracker stopped).
    Ignore,
}

/// Tracks the most recent user activity.
#[derive(Debug)]
pub struct ActivityTracker {
    /// Kinds that reset the idle clock. Set on `start`.
    tracked: Vec<ActivityKind>,

    /// Minimum interval between reschedule decisions.
    debounce: Duration,

    /// Instant of the most recent tracked event. Latest only, no history.
    last_activity: Option<Instant>,

    /// When the caller last acted on a `Reschedule` decision.
    last_reschedule: Option<Instant>,

    started: bool,
}

impl ActivityTracker {
    /// Create a stopped tracker with the given reschedule debounce.
    pub fn new(debounce: Duration) -> Self {
        Self {
            tracked: Vec::new(),
            debounce,
            last_activity: None,
            last_reschedule: None,
            started: false,
        }
    }

    /// Start tracking the given activity kinds.
    ///
    /// Idempotent: a second `start` without an intervening `stop` keeps the
    /// original kind set and does not double-register anything.
    pub fn start(&mut self, kinds: &[ActivityKind]) {
        if self.started {
            debug!("Activity tracker already started; ignoring");
            return;
        }
        self.tracked = kinds.to_vec();
        self.started = true;
        debug!(
            "Activity tracker started ({} kinds)",
            self.tracked.len()
        );
    }

    /// Stop tracking. Safe to call when never started.
    pub fn stop(&mut self) {
        if self.started {
            debug!("Activity tracker stopped");
        }
        self.started = false;
    }

    /// Whether the tracker is currently started.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Observe an activity event at `now`.
    ///
    /// Always updates the last-activity instant for tracked events (cheap),
    /// but only returns [`ActivityDecision::Reschedule`] when the debounce
    /// interval has passed since the last recorded reschedule. The caller
    /// decides whether to act and confirms with [`Self::mark_rescheduled`].
    pub fn observe(&mut self, kind: ActivityKind, now: Instant) -> ActivityDecision {
        if !self.started || !self.tracked.contains(&kind) {
            trace!("Ignoring {} event", kind.as_str());
            return ActivityDecision::Ignore;
        }

        self.last_activity = Some(now);

        let due = self
            .last_reschedule
            .is_none_or(|at| now.duration_since(at) >= self.debounce);

        if due {
            trace!("{} activity, reschedule due", kind.as_str());
            ActivityDecision::Reschedule
        } else {
            trace!("{} activity coalesced", kind.as_str());
            ActivityDecision::Coalesce
        }
    }

    /// Record that the caller rescheduled the timers at `now`.
    pub fn mark_rescheduled(&mut self, now: Instant) {
        self.last_reschedule = Some(now);
    }

    /// Instant of the most recent tracked event, if any.
    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }
}
