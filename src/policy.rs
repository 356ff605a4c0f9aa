//! Session-timeout policy retrieval.
//!
//! The monitor asks a [`PolicySupplier`] for the configured session timeout
//! at arm-time. Supplier failure is never fatal: the monitor logs it and
//! arms with its configured fallback instead.

use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Errors from a policy supplier.
#[derive(thiserror::Error, Debug)]
pub enum PolicyError {
    #[error("policy request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("policy response is missing session_timeout_minutes")]
    MalformedResponse,

    #[error("policy supplied a zero-minute session timeout")]
    ZeroTimeout,

    #[error("policy supplied an unrepresentable session timeout ({minutes} minutes)")]
    TimeoutOverflow { minutes: u64 },
}

/// Supplies the total idle timeout for the current session.
pub trait PolicySupplier: Send + Sync + 'static {
    /// Fetch the configured session timeout.
    fn session_timeout(&self) -> impl Future<Output = Result<Duration, PolicyError>> + Send;
}

/// Wire format of the policy endpoint.
#[derive(Debug, Deserialize)]
struct PolicyResponse {
    session_timeout_minutes: Option<u64>,
}

/// Convert a policy's minute count into a timeout duration.
///
/// The minute count comes off the wire, so an absurd value degrades to an
/// error (and thus the configured fallback) instead of overflowing.
fn timeout_from_minutes(minutes: u64) -> Result<Duration, PolicyError> {
    if minutes == 0 {
        return Err(PolicyError::ZeroTimeout);
    }
    let seconds = minutes
        .checked_mul(60)
        .ok_or(PolicyError::TimeoutOverflow { minutes })?;
    Ok(Duration::from_secs(seconds))
}

/// Policy supplier backed by an HTTP endpoint.
///
/// Expects a JSON body of the form `{"session_timeout_minutes": 30}`.
#[derive(Debug, Clone)]
pub struct HttpPolicySupplier {
    url: String,
    client: reqwest::Client,
}

impl HttpPolicySupplier {
    /// Create a supplier for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl PolicySupplier for HttpPolicySupplier {
    async fn session_timeout(&self) -> Result<Duration, PolicyError> {
        debug!("Fetching session policy from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?;
        let body: PolicyResponse = response.json().await?;

        let minutes = body
            .session_timeout_minutes
            .ok_or(PolicyError::MalformedResponse)?;
        timeout_from_minutes(minutes)
    }
}

/// Policy supplier with a fixed, in-process timeout.
#[derive(Debug, Clone)]
pub struct FixedPolicy {
    timeout: Duration,
}

impl FixedPolicy {
    /// Create a supplier that always returns `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl PolicySupplier for FixedPolicy {
    async fn session_timeout(&self) -> Result<Duration, PolicyError> {
        Ok(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_policy() {
        let policy = FixedPolicy::new(Duration::from_secs(600));
        assert_eq!(
            policy.session_timeout().await.unwrap(),
            Duration::from_secs(600)
        );
    }

    #[test]
    fn test_timeout_from_minutes() {
        assert_eq!(
            timeout_from_minutes(30).unwrap(),
            Duration::from_secs(1800)
        );
        assert!(matches!(
            timeout_from_minutes(0),
            Err(PolicyError::ZeroTimeout)
        ));
    }

    #[test]
    fn test_timeout_from_minutes_overflow() {
        assert!(matches!(
            timeout_from_minutes(u64::MAX),
            Err(PolicyError::TimeoutOverflow { minutes: u64::MAX })
        ));
    }

    #[test]
    fn test_policy_response_parsing() {
        let body: PolicyResponse =
            serde_json::from_str(r#"{"session_timeout_minutes": 45}"#).unwrap();
        assert_eq!(body.session_timeout_minutes, Some(45));

        // Unrelated fields are tolerated, the timeout is simply absent
        let body: PolicyResponse = serde_json::from_str(r#"{"other": true}"#).unwrap();
        assert!(body.session_timeout_minutes.is_none());
    }
}
