//! Idle-session monitor state machine.
//!
//! Composes the activity tracker and timer engine into a monitor with three
//! live states (`Active`, `Warning`, `Expired`) plus the disarmed resting
//! state. The monitor runs as a task driven by host commands and timer
//! fires; the host observes state through a watch channel and supplies the
//! logout routine as a [`SessionTerminator`].
//!
//! All transitions happen inside the monitor task, so the state and the
//! activity clock have a single owner and no locking.

use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::activity::{ActivityDecision, ActivityKind, ActivityTracker};
use crate::config::{self, IdleConfig};
use crate::policy::PolicySupplier;
use crate::timer::{FireKind, TimerEngine, TimerFire};

/// Observable monitor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Not tracking; nothing scheduled.
    Disarmed,
    /// Tracking activity, timers running.
    Active,
    /// Expiry is imminent; the host should surface a countdown until
    /// `expires_at`.
    Warning { expires_at: Instant },
    /// The session ended. Terminal: a fresh login needs a new monitor.
    Expired,
}

/// Host-supplied logout routine, invoked exactly once per arm cycle.
///
/// Clearing credentials and redirecting are the host's business; the
/// monitor only guarantees the single invocation on expiry.
pub trait SessionTerminator: Send + Sync + 'static {
    fn terminate(&self);
}

impl<F> SessionTerminator for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn terminate(&self) {
        self();
    }
}

/// Commands from the host to the monitor task.
#[derive(Debug)]
enum Command {
    Arm,
    Disarm,
    ContinueSession,
    Activity(ActivityKind),
}

/// Handle for driving and observing a spawned [`IdleMonitor`].
///
/// Commands are fire-and-forget: none of them surfaces an error to the
/// host. The host only ever observes the resulting state.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<MonitorState>,
    shutdown: CancellationToken,
}

impl MonitorHandle {
    /// Start tracking. Arms with the policy-supplied timeout, falling back
    /// to the configured one. No-op when already armed or expired.
    pub fn arm(&self) {
        self.send(Command::Arm);
    }

    /// Stop tracking and cancel all timers. Used when the session signal
    /// goes away (logout, token cleared).
    pub fn disarm(&self) {
        self.send(Command::Disarm);
    }

    /// Dismiss a warning and start a fresh idle period. No-op outside
    /// `Warning`.
    pub fn continue_session(&self) {
        self.send(Command::ContinueSession);
    }

    /// Report a user interaction.
    pub fn activity(&self, kind: ActivityKind) {
        self.send(Command::Activity(kind));
    }

    /// Current state.
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<MonitorState> {
        self.state.clone()
    }

    /// Stop the monitor task.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("Idle monitor task is gone; command dropped");
        }
    }
}

/// The idle monitor task state.
pub struct IdleMonitor<P, T> {
    config: IdleConfig,
    supplier: P,
    terminator: T,

    tracker: ActivityTracker,
    timers: TimerEngine,

    /// Effective timeout for the current arm cycle (policy or fallback).
    timeout: Duration,
    warning_lead: Duration,

    state: watch::Sender<MonitorState>,
    commands: mpsc::UnboundedReceiver<Command>,
    fires: mpsc::UnboundedReceiver<TimerFire>,

    expiry_delivered: bool,
}

impl<P, T> IdleMonitor<P, T>
where
    P: PolicySupplier,
    T: SessionTerminator,
{
    /// Spawn the monitor task and return the handle for it.
    ///
    /// The monitor starts disarmed; the host arms it once a session is
    /// present.
    pub fn spawn(config: IdleConfig, supplier: P, terminator: T) -> MonitorHandle {
        let (monitor, handle) = Self::new(config, supplier, terminator);
        let shutdown = handle.shutdown.clone();
        tokio::spawn(monitor.run(shutdown));
        handle
    }

    fn new(config: IdleConfig, supplier: P, terminator: T) -> (Self, MonitorHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(MonitorState::Disarmed);

        let monitor = Self {
            tracker: ActivityTracker::new(config.reschedule_debounce()),
            timers: TimerEngine::new(fire_tx),
            timeout: config.timeout(),
            warning_lead: config.warning_lead(),
            config,
            supplier,
            terminator,
            state: state_tx,
            commands: command_rx,
            fires: fire_rx,
            expiry_delivered: false,
        };

        let handle = MonitorHandle {
            commands: command_tx,
            state: state_rx,
            shutdown: CancellationToken::new(),
        };

        (monitor, handle)
    }

    async fn run(mut self, shutdown: CancellationToken) {
        debug!("Idle monitor task started");

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break, // all handles dropped
                },

                Some(fire) = self.fires.recv() => self.handle_fire(fire),
            }
        }

        self.tracker.stop();
        self.timers.cancel();
        debug!("Idle monitor task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Arm => self.handle_arm().await,
            Command::Disarm => self.handle_disarm(),
            Command::ContinueSession => self.handle_continue(),
            Command::Activity(kind) => self.handle_activity(kind),
        }
    }

    async fn handle_arm(&mut self) {
        match *self.state.borrow() {
            MonitorState::Expired => {
                warn!("Monitor has expired; a fresh session needs a new monitor");
                return;
            }
            MonitorState::Active | MonitorState::Warning { .. } => {
                debug!("Monitor already armed; ignoring");
                return;
            }
            MonitorState::Disarmed => {}
        }

        let timeout = match self.supplier.session_timeout().await {
            Ok(timeout) => {
                debug!("Session policy supplied timeout {:?}", timeout);
                timeout
            }
            Err(e) => {
                warn!(
                    "Session policy unavailable: {}. Using configured timeout {:?}",
                    e,
                    self.config.timeout()
                );
                self.config.timeout()
            }
        };
        let warning_lead = self.config.warning_lead();

        if let Err(e) = config::validate_durations(timeout, warning_lead) {
            error!("Refusing to arm idle monitor: {}", e);
            return;
        }

        self.timeout = timeout;
        self.warning_lead = warning_lead;
        self.expiry_delivered = false;

        let now = Instant::now();
        self.tracker.start(&self.config.tracked_events);
        self.tracker.mark_rescheduled(now);
        self.timers.schedule(now, timeout, warning_lead);
        self.set_state(MonitorState::Active);

        info!(
            "Idle monitor armed (timeout {:?}, warning lead {:?})",
            timeout, warning_lead
        );
    }

    fn handle_disarm(&mut self) {
        match *self.state.borrow() {
            MonitorState::Disarmed => {
                debug!("Monitor already disarmed; ignoring");
                return;
            }
            MonitorState::Expired => {
                // Nothing is running anymore; the expired state stays
                debug!("Monitor already expired; disarm is a no-op");
                return;
            }
            MonitorState::Active | MonitorState::Warning { .. } => {}
        }

        self.tracker.stop();
        self.timers.cancel();
        self.set_state(MonitorState::Disarmed);
        info!("Idle monitor disarmed");
    }

    fn handle_continue(&mut self) {
        if matches!(*self.state.borrow(), MonitorState::Warning { .. }) {
            info!("Session continued from warning");
            self.reset(Instant::now());
        } else {
            debug!("continue_session outside warning; ignoring");
        }
    }

    fn handle_activity(&mut self, kind: ActivityKind) {
        let state = *self.state.borrow();
        if !matches!(state, MonitorState::Active | MonitorState::Warning { .. }) {
            trace!("Activity while not armed; ignoring");
            return;
        }

        let now = Instant::now();
        match self.tracker.observe(kind, now) {
            ActivityDecision::Ignore => {}
            ActivityDecision::Reschedule => self.reset(now),
            ActivityDecision::Coalesce => {
                // Leaving the warning state always reschedules, debounce or not
                if matches!(state, MonitorState::Warning { .. }) {
                    self.reset(now);
                }
            }
        }
    }

    /// Start a fresh idle period from `baseline`.
    fn reset(&mut self, baseline: Instant) {
        self.tracker.mark_rescheduled(baseline);
        self.timers.schedule(baseline, self.timeout, self.warning_lead);
        self.set_state(MonitorState::Active);
    }

    fn handle_fire(&mut self, fire: TimerFire) {
        if !self.timers.is_current(fire.epoch) {
            trace!("Ignoring stale {:?} fire (epoch {})", fire.kind, fire.epoch);
            return;
        }

        match fire.kind {
            FireKind::Warning => self.handle_warning_fire(),
            FireKind::Expiry => self.handle_expiry_fire(),
        }
    }

    fn handle_warning_fire(&mut self) {
        if !matches!(*self.state.borrow(), MonitorState::Active) {
            trace!("Warning fire outside the active state; ignoring");
            return;
        }

        let now = Instant::now();

        // Coalesced activity since the last reschedule moves the real
        // warning deadline later; roll the timers forward instead of
        // warning early.
        if let Some(last) = self.tracker.last_activity() {
            let earliest = last + self.timeout - self.warning_lead;
            if now < earliest {
                debug!("Warning fired against a superseded baseline; rescheduling");
                self.tracker.mark_rescheduled(now);
                self.timers.schedule(last, self.timeout, self.warning_lead);
                return;
            }
        }

        let expires_at = self.timers.expires_at().unwrap_or(now + self.warning_lead);
        self.set_state(MonitorState::Warning { expires_at });
        warn!(
            "Session idle; expiry in {:?}",
            expires_at.saturating_duration_since(now)
        );
    }

    fn handle_expiry_fire(&mut self) {
        match *self.state.borrow() {
            MonitorState::Warning { .. } => {}
            // A current-epoch expiry without an observed warning should not
            // happen, but late and ambiguous fires expire rather than let
            // the session linger
            MonitorState::Active => warn!("Expiry fired without a warning; expiring anyway"),
            MonitorState::Disarmed | MonitorState::Expired => {
                trace!("Expiry fire outside an armed state; ignoring");
                return;
            }
        }

        self.tracker.stop();
        self.timers.cancel();
        self.set_state(MonitorState::Expired);

        if !self.expiry_delivered {
            self.expiry_delivered = true;
            info!("Idle timeout reached; terminating session");
            self.terminator.terminate();
        }
    }

    fn set_state(&self, next: MonitorState) {
        let prev = *self.state.borrow();
        if prev != next {
            debug!("State changed: {:?} -> {:?}", prev, next);
            self.state.send_replace(next);
        }
    }
}
