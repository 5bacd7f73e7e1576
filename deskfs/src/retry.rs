//! Caller-side retry of transient engine failures.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::engine::FsError;

/// Retries operations that fail with a retryable [`FsError`], sleeping an
/// exponentially growing, capped delay between attempts.
///
/// Only hand it operations that are safe to repeat.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
    jitter: bool,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Jittered policy; `max_attempts` counts the first try and is at least 1.
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max: max.max(base),
            jitter: true,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn without_jitter(self) -> Self {
        Self {
            jitter: false,
            ..self
        }
    }

    /// A policy that runs every operation exactly once.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, 1).without_jitter()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (0 for the first retry).
    pub fn delay_for<R: Rng + ?Sized>(&self, retry: u32, rng: &mut R) -> Duration {
        let step = self
            .base
            .saturating_mul(1u32 << retry.min(16))
            .min(self.max);
        if !self.jitter {
            return step;
        }
        let ceiling = u64::try_from(step.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rng.gen_range(0..=ceiling))
    }

    pub async fn run<T, F, Fut>(&self, operation: &str, mut attempt_fn: F) -> Result<T, FsError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FsError>>,
    {
        let mut retry = 0;
        loop {
            match attempt_fn().await {
                Err(err) if err.is_retryable() && retry + 1 < self.max_attempts => {
                    let delay = self.delay_for(retry, &mut rand::thread_rng());
                    retry += 1;
                    tracing::warn!(
                        operation,
                        attempt = retry,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(100), Duration::from_secs(2), 3)
    }
}
