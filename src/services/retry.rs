//! Bounded exponential backoff for calls to Notion and Sheets

use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::services::error::SyncError;

/// Maximum attempts per external call (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay between retries (doubled after every failed attempt)
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `f`, retrying transport failures until the attempt cap.
    ///
    /// Non-retryable errors are returned immediately; after the cap the last
    /// transport error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SyncError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) if attempt >= self.max_attempts => {
                    error!(
                        operation = %operation,
                        attempts = attempt,
                        error = %e,
                        "Max retries exceeded"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        operation = %operation,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Call failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO)
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = instant()
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(SyncError::Transport("reset".into()))
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_at_cap() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = instant()
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::Transport("503".into()))
            })
            .await;
        assert_eq!(result, Err(SyncError::Transport("503".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = instant()
            .run("auth", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(SyncError::Auth("expired".into()))
            })
            .await;
        assert!(matches!(result, Err(SyncError::Auth(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
