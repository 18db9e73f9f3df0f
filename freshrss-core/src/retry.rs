use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RequestConfig;
use crate::error::{ReaderError, Result};

const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Bounded exponential backoff for aggregator calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Writes must not be replayed after a timeout: the aggregator may have
    /// applied the change before the deadline hit.
    pub retry_timeouts: bool,
}

impl RetryPolicy {
    pub fn reads(config: &RequestConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            retry_timeouts: true,
        }
    }

    pub fn writes(config: &RequestConfig) -> Self {
        Self {
            max_attempts: config.write_retry_attempts.clamp(1, 2),
            base_delay: Duration::from_millis(config.retry_backoff_ms),
            retry_timeouts: false,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }

    fn should_retry(&self, err: &ReaderError) -> bool {
        match err {
            ReaderError::Timeout(_) => self.retry_timeouts,
            other => other.is_transient(),
        }
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && self.should_retry(&err) => {
                    let delay = self.backoff(attempt);
                    warn!(operation, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying aggregator call");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
