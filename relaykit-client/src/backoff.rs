//! Retry strategies for relay RPCs
//!
//! A strategy answers one question: after failed attempt number `attempt`
//! (0-indexed), how long to wait before trying again, or `None` to give up.
//! Strategies are stateless so one instance can be shared by every
//! concurrent publish.
//!
//! # Built-in Strategies
//!
//! - **ExponentialBackoff**: doubling delays with optional jitter (default)
//! - **FixedDelay**: constant delay between attempts
//! - **NoRetry**: surface the first failure
//!
//! [`retry`] drives an operation with a strategy and only retries errors that
//! are transient (see `Error::is_transient`).
//!
//! ```rust
//! use relaykit_client::{ExponentialBackoff, RetryStrategy};
//! use std::time::Duration;
//!
//! let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(2))
//!     .with_max_attempts(3);
//! assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(100)));
//! assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(200)));
//! assert_eq!(strategy.next_delay(2), None);
//! ```

use relaykit_core::Result;
use std::future::Future;
use std::time::Duration;

/// Decides whether and when a failed operation is attempted again
pub trait RetryStrategy: Send + Sync {
    /// Delay before the next try after failed attempt `attempt`
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Exponential backoff: `initial * 2^attempt`, capped at `max_delay`
///
/// `max_attempts` counts every try including the first, so a value of 3
/// allows two retries.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<u32>,
    jitter: bool,
}

impl ExponentialBackoff {
    pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts: None,
            jitter: false,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Add up to 25% random extra delay per attempt
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), Duration::from_secs(5))
            .with_max_attempts(3)
            .with_jitter()
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if attempt + 1 >= max {
                return None;
            }
        }

        let factor = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        let base = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let delay = base.min(self.max_delay.as_millis() as u64);

        if self.jitter && delay >= 4 {
            use rand::Rng;
            let extra = rand::thread_rng().gen_range(0..=(delay / 4));
            return Some(Duration::from_millis(delay + extra));
        }

        Some(Duration::from_millis(delay))
    }
}

/// Constant delay between attempts
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<u32>,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl RetryStrategy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt + 1 >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Never retry
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Run `operation` until it succeeds, fails permanently, or the strategy gives up
///
/// `on_retry` observes each scheduled retry (attempt number and delay).
pub async fn retry<T, F, Fut, R>(strategy: &dyn RetryStrategy, mut operation: F, mut on_retry: R) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, Duration, &relaykit_core::Error),
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => match strategy.next_delay(attempt) {
                Some(delay) => {
                    on_retry(attempt, delay, &err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaykit_core::{Error, JsonRpcErrorData};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff_doubles() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(100)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(200)));
        assert_eq!(strategy.next_delay(2), Some(Duration::from_millis(400)));
    }

    #[test]
    fn test_exponential_backoff_caps_delay() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(strategy.next_delay(10), Some(Duration::from_secs(1)));
        assert_eq!(strategy.next_delay(200), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_exponential_backoff_max_attempts_counts_first_try() {
        let strategy =
            ExponentialBackoff::new(Duration::from_millis(10), Duration::from_secs(1)).with_max_attempts(2);

        assert!(strategy.next_delay(0).is_some());
        assert!(strategy.next_delay(1).is_none());
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let strategy = ExponentialBackoff::new(Duration::from_millis(400), Duration::from_secs(10)).with_jitter();
        for _ in 0..50 {
            let delay = strategy.next_delay(0).unwrap();
            assert!(delay >= Duration::from_millis(400));
            assert!(delay <= Duration::from_millis(500));
        }
    }

    #[test]
    fn test_fixed_delay_and_no_retry() {
        let fixed = FixedDelay::new(Duration::from_millis(50)).with_max_attempts(3);
        assert_eq!(fixed.next_delay(0), Some(Duration::from_millis(50)));
        assert_eq!(fixed.next_delay(1), Some(Duration::from_millis(50)));
        assert_eq!(fixed.next_delay(2), None);

        assert_eq!(NoRetry.next_delay(0), None);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = AtomicU32::new(0);
        let strategy = FixedDelay::new(Duration::from_millis(1)).with_max_attempts(5);

        let result = retry(
            &strategy,
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::ConnectionClosed)
                    } else {
                        Ok(n)
                    }
                }
            },
            |_, _, _| {},
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let strategy = FixedDelay::new(Duration::from_millis(1)).with_max_attempts(5);

        let result: Result<()> = retry(
            &strategy,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::JsonRpc(JsonRpcErrorData::invalid_params("bad ttl"))) }
            },
            |_, _, _| {},
        )
        .await;

        assert!(matches!(result, Err(Error::JsonRpc(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let retries = AtomicU32::new(0);
        let strategy = FixedDelay::new(Duration::from_millis(1)).with_max_attempts(3);

        let result: Result<()> = retry(
            &strategy,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Error::ConnectionLost) }
            },
            |_, _, _| {
                retries.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert!(matches!(result, Err(Error::ConnectionLost)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(retries.load(Ordering::SeqCst), 2);
    }
}
