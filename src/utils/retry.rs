//! Bounded retry with linear backoff.
//!
//! Built on `tokio-retry`: the backoff is just an iterator of delays, so the
//! linear schedule `base, 2*base, 3*base, ...` is expressed as its own
//! strategy and capped with `take(max_retries)`.

use std::future::Future;
use std::time::Duration;

use tokio_retry::Retry;

/// Delay schedule where the wait before retry `k` is `base * k`.
#[derive(Debug, Clone)]
pub struct LinearBackoff {
    base: Duration,
    attempt: u32,
}

impl LinearBackoff {
    pub fn new(base: Duration) -> Self {
        Self { base, attempt: 0 }
    }
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        Some(self.base.saturating_mul(self.attempt))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        LinearBackoff::new(self.base_delay).take(self.max_retries)
    }
}

/// Runs `op` up to `policy.max_retries + 1` times, returning the first success
/// or the last error.
pub async fn with_retry<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    Retry::start(policy.delays(), || op()).await
}
