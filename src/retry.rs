//! Retry policy with exponential backoff

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How many times to attempt an operation and how long to wait in between
///
/// The delay after the n-th failed attempt (0-based) is
/// `initial_delay * multiplier^n`. With the defaults that is 1s, 2s, 4s, 8s
/// and 16s, so one operation gives up after at most 31s of waiting.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1), 2.0)
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay slept after the given failed attempt (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.initial_delay
            .mul_f64(self.multiplier.powi(attempt as i32))
    }

    /// Worst-case total time spent sleeping before giving up
    pub fn max_total_delay(&self) -> Duration {
        (0..self.max_attempts).map(|a| self.delay_for(a)).sum()
    }

    fn backoff(&self) -> ExponentialBackoff {
        let ceiling = self.delay_for(self.max_attempts.saturating_sub(1));
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_delay)
            .with_multiplier(self.multiplier)
            .with_randomization_factor(0.0)
            .with_max_interval(ceiling.max(self.initial_delay))
            .with_max_elapsed_time(None)
            .build()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts
    ///
    /// Every retryable failure is followed by a backoff sleep, the last one
    /// included. The error of the final attempt is returned on exhaustion.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        operation_name: &str,
        mut operation: F,
        is_retryable: P,
    ) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut backoff = self.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if is_retryable(&e) => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.delay_for(attempt - 1));
                    warn!(
                        "{} failed: {}. Attempt {} of {}. Retrying in {:?}...",
                        operation_name, e, attempt, self.max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}
