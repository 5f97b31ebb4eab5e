//! Retry utilities with randomized, optionally exponential backoff.

use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Lower bound of the random wait between attempts
    pub min_delay: Duration,
    /// Upper bound of the random wait between attempts
    pub max_delay: Duration,
    /// Multiplier applied to the random wait per failed attempt (1.0 = flat)
    pub backoff_multiplier: f64,
    /// Cap on any single wait after the multiplier is applied
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 20,
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            backoff_multiplier: 1.0,
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the random wait window
    pub fn wait_between(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min.min(max);
        self.max_delay = max.max(min);
        self
    }

    /// Enable exponential growth of the wait
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Wait before the attempt following `failed_attempts` failures
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let min = self.min_delay.as_millis() as u64;
        let max = self.max_delay.as_millis() as u64;
        let base = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };

        let exponent = failed_attempts.saturating_sub(1) as i32;
        let scaled = base as f64 * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Execute an async operation with retry logic.
///
/// Only errors for which [`SourceError::is_retryable`] holds are retried.
/// Terminal errors are returned immediately even if attempts remain. When
/// the attempt cap is reached the last error is returned.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let mut attempts = 0;
    let mut operation = operation;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} retryable failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) if error.is_retryable() => {
                if attempts >= config.max_attempts {
                    tracing::warn!("Operation failed after {} attempts: {}", attempts, error);
                    return Err(error);
                }

                let delay = config.delay_for(attempts);
                tracing::debug!(
                    "Retryable error on attempt {}/{}: {}, retrying in {:?}",
                    attempts,
                    config.max_attempts,
                    error,
                    delay
                );
                sleep(delay).await;
            }
            Err(error) => {
                tracing::debug!("Terminal error on attempt {}: {}", attempts, error);
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .max_attempts(max_attempts)
            .wait_between(Duration::from_millis(1), Duration::from_millis(2))
    }

    #[tokio::test]
    async fn test_retry_success_first_try() {
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(20), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Ok("success")
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), 1);
    }

    #[tokio::test]
    async fn test_retry_success_after_k_failures() {
        let k = 7;
        let call_count = Rc::new(RefCell::new(0));

        let result = {
            let call_count = call_count.clone();
            with_retry(fast_config(20), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    if *call_count.borrow() <= k {
                        Err(SourceError::CaptchaNeeded("blocked".to_string()))
                    } else {
                        Ok("success")
                    }
                }
            })
        }
        .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(*call_count.borrow(), k + 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_with_last_error() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<(), SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(5), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    let n = *call_count.borrow();
                    Err(SourceError::SiteAccessError(format!("attempt {}", n)))
                }
            })
        }
        .await;

        match result {
            Err(SourceError::SiteAccessError(msg)) => assert_eq!(msg, "attempt 5"),
            other => panic!("Expected SiteAccessError, got {:?}", other),
        }
        assert_eq!(*call_count.borrow(), 5);
    }

    #[tokio::test]
    async fn test_retry_returns_terminal_error_immediately() {
        let call_count = Rc::new(RefCell::new(0));

        let result: Result<&str, SourceError> = {
            let call_count = call_count.clone();
            with_retry(fast_config(20), move || {
                let call_count = call_count.clone();
                async move {
                    *call_count.borrow_mut() += 1;
                    Err(SourceError::NoMirrorsAvailable)
                }
            })
        }
        .await;

        assert!(matches!(result, Err(SourceError::NoMirrorsAvailable)));
        assert_eq!(*call_count.borrow(), 1);
    }

    #[test]
    fn test_delay_within_window() {
        let config = RetryConfig::default();
        for attempt in 1..=20 {
            let delay = config.delay_for(attempt);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let config = RetryConfig::default()
            .wait_between(Duration::from_millis(100), Duration::from_millis(100))
            .backoff_multiplier(2.0);
        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
        assert_eq!(config.delay_for(30), config.max_backoff);
    }
}
