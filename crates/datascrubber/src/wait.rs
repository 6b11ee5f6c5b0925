//! Bounded polling of provider-side state transitions.
//!
//! Waits poll a check at a fixed interval until it reports ready or an
//! absolute deadline, computed once when the wait starts, has passed. Time is
//! read from `tokio::time`, so tests can run waits on a paused clock.

use crate::error::{Result, ScrubError};
use datascrubber_common::defaults::POLL_INTERVAL;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for a bounded poll loop.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Delay between two checks
    pub interval: Duration,
    /// Timeout in minutes, measured from the start of the wait
    pub timeout_minutes: u64,
}

impl WaitConfig {
    /// Poll every [`POLL_INTERVAL`] for at most `timeout_minutes`.
    pub fn minutes(timeout_minutes: u64) -> Self {
        Self {
            interval: POLL_INTERVAL,
            timeout_minutes,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }
}

/// Poll `check` until it returns `Ok(Some(value))`.
///
/// # Arguments
/// * `config` - Poll interval and timeout
/// * `action` - What is being waited for, used in the timeout error
///   (e.g. "creating RDS instance")
/// * `resource_name` - Identifier of the resource, for logging and errors
/// * `check` - Returns `Ok(Some(_))` when ready, `Ok(None)` to poll again
///
/// # Returns
/// * `Ok(value)` - What the final check observed
/// * `Err(ScrubError::Timeout)` - The deadline passed first
/// * `Err` - The check itself failed
pub async fn wait_for_resource<T, F, Fut>(
    config: &WaitConfig,
    action: &'static str,
    resource_name: &str,
    mut check: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    // A deadline past what the clock can represent never expires.
    let deadline = Instant::now().checked_add(config.timeout());
    let mut attempts = 0u32;

    while deadline.is_none_or(|deadline| Instant::now() <= deadline) {
        attempts += 1;
        if let Some(value) = check().await? {
            debug!(resource = %resource_name, attempts, "Resource ready");
            return Ok(value);
        }

        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_secs = config.interval.as_secs(),
            "Resource not ready, retrying"
        );
        tokio::time::sleep(config.interval).await;
    }

    Err(ScrubError::Timeout {
        action,
        resource: resource_name.to_string(),
        minutes: config.timeout_minutes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_immediately() {
        let value = wait_for_resource(&WaitConfig::minutes(1), "waiting for", "r", || async {
            Ok(Some("ready"))
        })
        .await
        .unwrap();

        assert_eq!(value, "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_with_huge_timeout_does_not_overflow() {
        let polls = Cell::new(0u32);

        let seen = wait_for_resource(&WaitConfig::minutes(u64::MAX), "waiting for", "r", || {
            polls.set(polls.get() + 1);
            let poll = polls.get();
            async move { Ok((poll >= 2).then_some(poll)) }
        })
        .await
        .unwrap();

        assert_eq!(seen, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_on_kth_poll() {
        let polls = Cell::new(0u32);
        let start = Instant::now();

        let seen = wait_for_resource(&WaitConfig::minutes(5), "waiting for", "r", || {
            polls.set(polls.get() + 1);
            let poll = polls.get();
            async move { Ok((poll >= 4).then_some(poll)) }
        })
        .await
        .unwrap();

        assert_eq!(seen, 4);
        assert_eq!(polls.get(), 4);
        assert_eq!(start.elapsed(), POLL_INTERVAL * 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_after_configured_minutes() {
        let polls = Cell::new(0u32);
        let start = Instant::now();

        let result: Result<()> =
            wait_for_resource(&WaitConfig::minutes(2), "creating RDS instance", "db-1", || {
                polls.set(polls.get() + 1);
                async { Ok(None) }
            })
            .await;

        match result {
            Err(ScrubError::Timeout { action, resource, minutes }) => {
                assert_eq!(action, "creating RDS instance");
                assert_eq!(resource, "db-1");
                assert_eq!(minutes, 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        // Polls at 0s, 10s, ..., 120s, then the deadline has passed.
        assert_eq!(polls.get(), 13);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(120));
        assert!(elapsed <= Duration::from_secs(130));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_check_error() {
        let result: Result<()> =
            wait_for_resource(&WaitConfig::minutes(1), "waiting for", "r", || async {
                Err(ScrubError::config("check failed"))
            })
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("check failed"));
    }
}
