//! Retry policy for provider calls.
//!
//! Exponential backoff with jitter, bounded by a maximum attempt count. When
//! the server supplies a `retry-after` delay it takes precedence over the
//! computed backoff if it is longer.

use backon::{BackoffBuilder, ExponentialBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::api::error::ApiError;

/// Bounded exponential retry for transient API failures
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum retry attempts after the first call
    pub max_retries: usize,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    fn strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
            .with_jitter()
    }

    /// Run `op` until it succeeds, fails terminally, or retries are exhausted
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut backoff = self.strategy().build();

        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => err,
                Err(err) => return Err(err),
            };

            let Some(computed) = backoff.next() else {
                return Err(err);
            };
            let delay = err.retry_after().map_or(computed, |d| d.max(computed));

            warn!(%label, ?delay, error = %err, "Retrying after transient failure");
            tokio::time::sleep(delay).await;
        }
    }
}
