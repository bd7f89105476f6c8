//! Dependency waiter
//!
//! Polls a downstream service until a probe succeeds or a fixed retry budget runs out.
//! The delay is fixed, with no backoff. Past the budget, restarting the container is
//! the orchestrator's job.

use std::future::Future;

use tokio::time::sleep;

use crate::config::WaitPolicy;
use crate::error::{ProvisionError, Result};

/// Run `probe` until it succeeds, sleeping `policy.delay` after every failed attempt
///
/// An unreachable target therefore fails after exactly `attempts × delay` (plus the time
/// spent inside the probes) with [`ProvisionError::DependencyUnavailable`].
pub async fn wait_until_ready<F, Fut>(target: &str, policy: WaitPolicy, mut probe: F) -> Result<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    for attempt in 1..=policy.attempts {
        match probe().await {
            Ok(()) => {
                tracing::info!(target_name = %target, attempt, "dependency is ready");
                return Ok(attempt);
            }
            Err(err) => {
                tracing::info!(
                    target_name = %target,
                    attempt,
                    max_attempts = policy.attempts,
                    error = %err,
                    "dependency not ready, retrying in {}",
                    humantime::format_duration(policy.delay)
                );
                sleep(policy.delay).await;
            }
        }
    }

    Err(ProvisionError::DependencyUnavailable {
        target: target.to_string(),
        attempts: policy.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;
    use tokio::time::Instant;

    fn refused() -> Result<()> {
        Err(crate::error::database::error("connection refused"))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt_does_not_sleep() {
        let start = Instant::now();
        let policy = WaitPolicy {
            attempts: 5,
            delay: Duration::from_secs(2),
        };
        let attempt = wait_until_ready("db", policy, || async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(attempt, 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_failures() {
        let calls = Cell::new(0u32);
        let policy = WaitPolicy {
            attempts: 10,
            delay: Duration::from_secs(3),
        };
        let start = Instant::now();
        let attempt = wait_until_ready("db", policy, || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { if n < 4 { refused() } else { Ok(()) } }
        })
        .await
        .unwrap();
        assert_eq!(attempt, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_fails_after_exact_budget() {
        let calls = Cell::new(0u32);
        let policy = WaitPolicy {
            attempts: 7,
            delay: Duration::from_millis(1500),
        };
        let start = Instant::now();
        let result = wait_until_ready("mysql://db/gibbon", policy, || {
            calls.set(calls.get() + 1);
            async { refused() }
        })
        .await;

        assert!(matches!(
            result,
            Err(ProvisionError::DependencyUnavailable { attempts: 7, .. })
        ));
        assert_eq!(calls.get(), 7);
        assert_eq!(start.elapsed(), Duration::from_millis(1500) * 7);
    }
}
