//! Bounded retries with proxy rotation around a single fetch.
//!
//! This is the only layer that treats fetch failures as transient. Blocked
//! responses and retriable errors trigger a fresh proxy draw and a backoff
//! delay; anything it returns is final for that fetch.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ScraperError;
use crate::fetch::{FetchResult, FetchStrategy};
use crate::proxy::ProxyPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub backoff_base_ms: u64,
    /// Ceiling applied to every delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based).
    ///
    /// | retry | delay (base = 1 000 ms)      |
    /// |-------|------------------------------|
    /// | 1     | 1 000 ms                     |
    /// | 2     | 2 000 ms                     |
    /// | 3     | 4 000 ms                     |
    ///
    /// Never decreases from one retry to the next and is capped at
    /// `max_delay_ms`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(20);
        let computed = self.backoff_base_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(computed.min(self.max_delay_ms))
    }
}

/// Fetches `target_url` with up to `policy.max_attempts` attempts.
///
/// Each attempt draws a proxy from `pool` (direct connection when the pool is
/// empty). A blocked result counts as [`ScraperError::BotBlocked`]. The first
/// clean, unblocked result is returned with its attempt number stamped.
///
/// # Errors
///
/// - The last observed error once all attempts are exhausted.
/// - Non-retriable errors (e.g. [`ScraperError::Config`]) immediately.
/// - [`ScraperError::Cancelled`] if `cancel` fires during a fetch or delay.
pub async fn fetch_with_retry<F>(
    strategy: &F,
    pool: &ProxyPool,
    target_url: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<FetchResult, ScraperError>
where
    F: FetchStrategy + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let cancelled = || ScraperError::Cancelled {
        url: target_url.to_owned(),
    };

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let proxy = pool.pick_random();

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            result = strategy.fetch(target_url, proxy) => result,
        };

        let err = match outcome {
            Ok(mut result) if !result.blocked => {
                result.attempt = attempt;
                tracing::debug!(
                    target_url,
                    attempt,
                    strategy = strategy.name(),
                    "fetch succeeded"
                );
                return Ok(result);
            }
            Ok(_) => ScraperError::BotBlocked {
                url: target_url.to_owned(),
            },
            Err(e) => e,
        };

        if !err.is_retriable() || attempt >= max_attempts {
            if err.is_retriable() {
                tracing::warn!(
                    target_url,
                    attempts = attempt,
                    error = %err,
                    "fetch attempts exhausted"
                );
            }
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        tracing::warn!(
            target_url,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            proxy = proxy.map(|p| p.host.as_str()),
            error = %err,
            "transient fetch failure; rotating proxy and retrying after backoff"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            () = tokio::time::sleep(delay) => {}
        }
    }
}

#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;
