//! Configuration loading and defaults for the idle-session monitor.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::activity::ActivityKind;

/// Errors for invalid idle configurations.
///
/// These indicate a host integration mistake, not a runtime condition;
/// the monitor refuses to arm on them.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("idle timeout must be greater than zero")]
    ZeroTimeout,

    #[error("warning lead ({lead_seconds}s) must be shorter than the idle timeout ({timeout_seconds}s)")]
    WarningLeadTooLong {
        lead_seconds: u64,
        timeout_seconds: u64,
    },
}

/// Main configuration for the idle-session monitor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdleConfig {
    /// Total inactivity duration before the session expires, in seconds
    /// (default: 1800). Also the fallback when a policy supplier fails.
    pub timeout_seconds: u64,

    /// How long before expiry the warning is raised, in seconds (default: 60).
    /// May be zero: the warning then fires together with expiry.
    pub warning_lead_seconds: u64,

    /// Minimum interval between timer reschedules under continuous activity,
    /// in seconds (default: 1). Activity itself is recorded on every event;
    /// only the reschedule is debounced.
    pub reschedule_debounce_seconds: u64,

    /// Activity kinds that reset the idle clock (default: all).
    pub tracked_events: Vec<ActivityKind>,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30 * 60,
            warning_lead_seconds: 60,
            reschedule_debounce_seconds: 1,
            tracked_events: ActivityKind::ALL.to_vec(),
        }
    }
}

impl IdleConfig {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: IdleConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration from the default path, or return defaults if not found.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load(p);
        }

        // Try default config path
        if let Some(config_dir) = dirs::config_dir() {
            let default_path = config_dir.join("idlewatch").join("config.toml");
            if default_path.exists() {
                return Self::load(&default_path);
            }
        }

        Ok(Self::default())
    }

    /// Check the configured durations against the monitor's invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_durations(self.timeout(), self.warning_lead())
    }

    /// Total idle timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Warning lead time.
    pub fn warning_lead(&self) -> Duration {
        Duration::from_secs(self.warning_lead_seconds)
    }

    /// Debounce interval for timer reschedules.
    pub fn reschedule_debounce(&self) -> Duration {
        Duration::from_secs(self.reschedule_debounce_seconds)
    }
}

/// Validate a timeout/warning-lead pair.
///
/// Used both for file-loaded configs and for the effective pair after a
/// policy supplier overrides the timeout at arm-time.
pub fn validate_durations(timeout: Duration, warning_lead: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::ZeroTimeout);
    }
    if warning_lead >= timeout {
        return Err(ConfigError::WarningLeadTooLong {
            lead_seconds: warning_lead.as_secs(),
            timeout_seconds: timeout.as_secs(),
        });
    }
    Ok(())
}
