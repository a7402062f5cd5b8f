//! Bounded retry with linearly increasing delay.
//!
//! Wraps object store calls and the final sync state save. Platform queries and the
//! transfer tool are never retried here.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

/// Upper bound on attempts, matching what configuration validation allows.
pub const MAX_ATTEMPTS: u32 = 10;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, DEFAULT_BASE_DELAY)
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to `1..=MAX_ATTEMPTS`.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            base_delay,
        }
    }

    /// A policy that retries without sleeping, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds or the attempts run out, returning the last error.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.max_attempts => {
                    error!(
                        operation,
                        attempts = attempt,
                        error = %err,
                        "Operation failed after exhausting retries"
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_delay_grows_linearly() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(4), Duration::from_millis(400));
    }

    #[test]
    fn test_attempts_are_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
        assert_eq!(RetryPolicy::new(50, Duration::ZERO).max_attempts(), MAX_ATTEMPTS);
        assert_eq!(RetryPolicy::default().max_attempts(), 10);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);

        let result: Result<u32, String> = policy
            .run("flaky", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 { Err(format!("attempt {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(4);

        let result: Result<(), String> = policy
            .run("always-fails", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("attempt {n}"))
            })
            .await;

        assert_eq!(result, Err("attempt 4".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
