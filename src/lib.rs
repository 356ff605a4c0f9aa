//! idlewatch - idle-session monitoring.
//!
//! Watches for user inactivity and walks a session through
//! `Active -> Warning -> Expired`, invoking a host-supplied terminator on
//! expiry. The total timeout comes from a session policy supplier with a
//! configured fallback; activity events reset the idle clock, debounced so
//! high-frequency input does not thrash the timers.
//!
//! The host drives the monitor through a [`MonitorHandle`] (`arm`,
//! `disarm`, `continue_session`, `activity`) and observes state through a
//! watch channel, so the monitor itself stays host-agnostic.

pub mod activity;
pub mod config;
pub mod monitor;
pub mod policy;
pub mod timer;

pub use activity::{ActivityKind, ActivityTracker};
pub use config::{ConfigError, IdleConfig};
pub use monitor::{IdleMonitor, MonitorHandle, MonitorState, SessionTerminator};
pub use policy::{FixedPolicy, HttpPolicySupplier, PolicyError, PolicySupplier};
