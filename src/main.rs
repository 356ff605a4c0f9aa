//! idlewatch - terminal idle-session watchdog.
//!
//! Arms an idle monitor against stdin: every input line counts as user
//! activity, a warning with a countdown is shown shortly before expiry, and
//! the session ends after the full idle timeout.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use idlewatch::{
    ActivityKind, FixedPolicy, HttpPolicySupplier, IdleConfig, IdleMonitor, MonitorState,
    PolicySupplier, SessionTerminator,
};

/// Terminal idle-session watchdog.
///
/// Treats stdin lines as user activity and ends the session after the
/// configured period of inactivity, with a warning beforehand.
#[derive(Parser, Debug)]
#[command(name = "idlewatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL of a session-policy endpoint supplying the timeout.
    #[arg(long)]
    policy_url: Option<String>,

    /// Override the idle timeout, in minutes.
    #[arg(long)]
    timeout_minutes: Option<u64>,

    /// Override the warning lead, in seconds.
    #[arg(long)]
    warning_seconds: Option<u64>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("idlewatch v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = IdleConfig::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    apply_overrides(&mut config, args.timeout_minutes, args.warning_seconds);
    config.validate().context("Invalid idle configuration")?;

    info!(
        "Configuration loaded (timeout={}s, warning_lead={}s)",
        config.timeout_seconds, config.warning_lead_seconds
    );

    match args.policy_url {
        Some(url) => {
            info!("Using session policy endpoint: {}", url);
            run_watchdog(config, HttpPolicySupplier::new(url)).await
        }
        None => {
            let timeout = config.timeout();
            run_watchdog(config, FixedPolicy::new(timeout)).await
        }
    }
}

/// Apply CLI overrides onto the loaded configuration.
///
/// The minute flag saturates instead of wrapping; the resulting config
/// still goes through `validate`.
fn apply_overrides(
    config: &mut IdleConfig,
    timeout_minutes: Option<u64>,
    warning_seconds: Option<u64>,
) {
    if let Some(minutes) = timeout_minutes {
        config.timeout_seconds = minutes.saturating_mul(60);
    }
    if let Some(seconds) = warning_seconds {
        config.warning_lead_seconds = seconds;
    }
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("idlewatch={}", level))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// The watchdog's logout routine: in the demo it only announces the end,
/// the main loop exits on the Expired state.
struct LogoutAction;

impl SessionTerminator for LogoutAction {
    fn terminate(&self) {
        warn!("Idle timeout reached; ending session");
    }
}

/// Run the watchdog loop until expiry or interruption.
async fn run_watchdog<P: PolicySupplier>(config: IdleConfig, supplier: P) -> Result<()> {
    let handle = IdleMonitor::spawn(config, supplier, LogoutAction);
    handle.arm();

    let mut states = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut countdown = tokio::time::interval(Duration::from_secs(1));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Type to stay active; \"continue\" dismisses a warning, \"logout\"/\"login\" toggle the session");

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted; disarming");
                handle.disarm();
                break;
            }

            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                match state {
                    MonitorState::Active => info!("Session active"),
                    MonitorState::Warning { expires_at } => warn!(
                        "Session expires in {}s; type or \"continue\" to stay signed in",
                        expires_at.saturating_duration_since(Instant::now()).as_secs()
                    ),
                    MonitorState::Expired => {
                        info!("Session expired");
                        break;
                    }
                    MonitorState::Disarmed => info!("Monitor disarmed"),
                }
            }

            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match line.trim() {
                    "logout" => handle.disarm(),
                    "login" => handle.arm(),
                    "continue" => handle.continue_session(),
                    _ => handle.activity(ActivityKind::Key),
                },
                Ok(None) => {
                    debug!("stdin closed; relying on timers only");
                    stdin_open = false;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    stdin_open = false;
                }
            },

            // Live countdown while a warning is showing
            _ = countdown.tick() => {
                if let MonitorState::Warning { expires_at } = handle.state() {
                    info!(
                        "{}s until session expiry",
                        expires_at.saturating_duration_since(Instant::now()).as_secs()
                    );
                }
            }
        }
    }

    handle.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let mut config = IdleConfig::default();
        apply_overrides(&mut config, Some(10), Some(30));
        assert_eq!(config.timeout_seconds, 600);
        assert_eq!(config.warning_lead_seconds, 30);

        // Unset flags leave the loaded values alone
        apply_overrides(&mut config, None, None);
        assert_eq!(config.timeout_seconds, 600);
        assert_eq!(config.warning_lead_seconds, 30);
    }

    #[test]
    fn test_apply_overrides_saturates() {
        let mut config = IdleConfig::default();
        apply_overrides(&mut config, Some(u64::MAX), None);
        assert_eq!(config.timeout_seconds, u64::MAX);
    }
}
