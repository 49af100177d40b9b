use crate::error::{Result, SyncError};
use std::cmp::min;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Exponential backoff for transient failures ([SyncError::is_retryable]).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// No waiting between attempts, for tests.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-based); a server-provided delay wins but is still
    /// capped.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        min(retry_after.unwrap_or(backoff), self.max_delay)
    }

    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(what, op, SyncError::is_retryable).await
    }

    /// For requests that must not be applied twice. Only a [SyncError::RateLimit] is retried,
    /// since the server rejected that request outright; a 5xx or a dropped connection may
    /// arrive after the write already landed.
    pub async fn run_unreplayable<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_while(what, op, |err| matches!(err, SyncError::RateLimit { .. }))
            .await
    }

    async fn run_while<T, F, Fut>(
        &self,
        what: &str,
        mut op: F,
        retryable: impl Fn(&SyncError) -> bool,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Err(err) if retryable(&err) && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, err.retry_after());
                    warn!(
                        "{what} failed ({err}), retrying in {:?} [{}/{}]",
                        delay,
                        attempt + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(SyncError::Network(message)) if attempt > 0 => {
                    return Err(SyncError::Network(format!(
                        "{message} (gave up after {} retries)",
                        attempt
                    )))
                }
                result => return result,
            }
        }
    }
}
