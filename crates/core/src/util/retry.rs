//! Exponential backoff for flaky network fetches (voice model downloads).

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay_ms as u64).min(self.max_delay)
    }
}

/// Runs `f` until it succeeds, returns a non-retryable error, or runs out of attempts.
///
/// At least one attempt is always made, even when `max_attempts` is zero.
pub async fn retry_with_backoff<F, T, E, Fut>(
    config: &RetryConfig,
    mut f: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("operation succeeded on attempt {attempt}");
                }
                return Ok(result);
            }
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                let delay = config.delay_for_attempt(attempt);
                warn!("operation failed on attempt {attempt}/{max_attempts}, retrying after {delay:?}");
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Server errors, timeouts and rate limiting are worth another try.
pub fn is_http_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn delay_doubles_per_attempt() {
        let config = RetryConfig::new(5, Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(800));
    }

    #[test]
    fn delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 10.0,
            max_delay: Duration::from_secs(1),
        };
        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(1));
    }

    #[test]
    fn http_statuses() {
        assert!(is_http_retryable(500));
        assert!(is_http_retryable(503));
        assert!(is_http_retryable(429));
        assert!(is_http_retryable(408));
        assert!(!is_http_retryable(400));
        assert!(!is_http_retryable(404));
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(3, Duration::from_millis(1));
        let result: Result<u32, &str> = retry_with_backoff(
            &config,
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err("flaky")
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig::new(5, Duration::from_millis(1));
        let result: Result<(), &str> = retry_with_backoff(
            &config,
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("404")
            },
            |_| false,
        )
        .await;
        assert_eq!(result, Err("404"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
