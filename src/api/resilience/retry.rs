//! Bounded retry of transient failures
//!
//! An attempt that fails with a retryable error (`TryLater` or a transport
//! failure) is repeated up to `max_retries` more times. Everything else,
//! authentication failures included, propagates on the first occurrence.

use log::{debug, info, warn};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::api::error::{QuickbooksError, Result};

/// Retry budget and pacing. The default retries immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::immediate(3)
    }
}

impl RetryConfig {
    /// No wait between attempts
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Exponential backoff with jitter, for callers that want to be gentler
    pub fn backoff(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub async fn execute<F, Fut, T>(&self, cancel: &CancellationToken, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_observed(cancel, |_, _, _| {}, operation).await
    }

    /// Run `operation` (given the 1-based attempt number) until it succeeds,
    /// fails terminally, or the budget runs out. `on_retry` sees each
    /// retryable failure before the next attempt.
    pub async fn execute_observed<F, Fut, T, R>(
        &self,
        cancel: &CancellationToken,
        mut on_retry: R,
        mut operation: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        R: FnMut(u32, &QuickbooksError, Duration),
    {
        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                info!("Operation cancelled before attempt {}", attempt);
                return Err(QuickbooksError::Cancelled);
            }

            debug!("Executing operation (attempt {}/{})", attempt, max_attempts);

            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = self.calculate_delay(attempt);
                    warn!("Operation failed on attempt {} (retryable): {}", attempt, error);
                    on_retry(attempt, &error, delay);

                    if !delay.is_zero() {
                        tokio::select! {
                            _ = cancel.cancelled() => return Err(QuickbooksError::Cancelled),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    attempt += 1;
                }
                Err(error) => {
                    if error.is_retryable() {
                        warn!("Operation failed after exhausting {} attempts: {}", max_attempts, error);
                    } else {
                        debug!("Operation failed on attempt {} (not retryable): {}", attempt, error);
                    }
                    return Err(error);
                }
            }
        }
    }

    /// Exponential delay before the attempt following `attempt`, capped
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.config.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);
        let delay = Duration::from_millis(delay_ms as u64).min(self.config.max_delay.max(self.config.base_delay));

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            return Duration::from_millis((delay.as_millis() as f64 * jitter_factor) as u64);
        }

        delay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::{ErrorRecord, TransportError};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn try_later() -> QuickbooksError {
        QuickbooksError::TryLater(ErrorRecord::new("10000", "busy"))
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(policy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(policy.calculate_delay(3), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 10,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: false,
        });

        assert_eq!(policy.calculate_delay(5), Duration::from_secs(5));
        assert_eq!(policy.calculate_delay(10), Duration::from_secs(5));
    }

    #[test]
    fn test_default_is_immediate() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.config().max_attempts(), 4);
        assert_eq!(policy.calculate_delay(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_try_later_then_success() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = policy
            .execute(&CancellationToken::new(), |_| {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                async move { if count < 2 { Err(try_later()) } else { Ok("done") } }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_surfaces_last_error() {
        let policy = RetryPolicy::new(RetryConfig::immediate(2));
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> = policy
            .execute(&CancellationToken::new(), |attempt| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(QuickbooksError::Transport(TransportError::Other(format!("attempt {}", attempt)))) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(QuickbooksError::Transport(TransportError::Other(message))) => assert_eq!(message, "attempt 3"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_terminal_error_not_retried() {
        let policy = RetryPolicy::default();
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let mut observed = 0;

        let result: Result<()> = policy
            .execute_observed(
                &CancellationToken::new(),
                |_, _, _| observed += 1,
                |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Err(QuickbooksError::AuthenticationFailure(ErrorRecord::new("3200", "no"))) }
                },
            )
            .await;

        assert!(matches!(result, Err(QuickbooksError::AuthenticationFailure(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(observed, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<()> = RetryPolicy::default().execute(&cancel, |_| async { Ok(()) }).await;
        assert!(matches!(result, Err(QuickbooksError::Cancelled)));
    }
}
