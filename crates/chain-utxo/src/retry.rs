//! Retry on rate limiting.
//!
//! Only [`SourceError::RateLimited`] is retried. Any other failure is
//! returned at once.

use std::time::Duration;

use log::warn;
use rand::Rng;

use crate::error::SourceError;
use crate::source::{Broadcaster, UtxoSource};
use crate::utxo::Utxo;

/// How often and how long to wait before retrying a rate-limited call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `None` retries forever.
    pub max_attempts: Option<u32>,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomize each delay within its upper half.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    /// Five attempts, doubling from 2 s up to 30 s, with jitter.
    fn default() -> Self {
        RetryPolicy {
            max_attempts: Some(5),
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Retry forever with a constant delay.
    pub fn fixed_unbounded(delay: Duration) -> Self {
        RetryPolicy {
            max_attempts: None,
            base_delay: delay,
            max_delay: delay,
            jitter: false,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        RetryPolicy {
            max_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Upper bound of the wait after the `failures`-th consecutive failure.
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    fn delay(&self, failures: u32) -> Duration {
        let ceiling = self.backoff(failures);
        if !self.jitter {
            return ceiling;
        }
        let ceiling_ms = ceiling.as_millis() as u64;
        let floor_ms = ceiling_ms / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor_ms..=ceiling_ms))
    }
}

/// Run `op`, sleeping with `sleep` between rate-limited attempts.
pub fn retry<T, F, S>(policy: &RetryPolicy, mut sleep: S, mut op: F) -> Result<T, SourceError>
where
    F: FnMut() -> Result<T, SourceError>,
    S: FnMut(Duration),
{
    let mut attempts = 0u32;
    loop {
        attempts = attempts.saturating_add(1);
        match op() {
            Err(SourceError::RateLimited) => {
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    warn!("still rate limited after {attempts} attempts, giving up");
                    return Err(SourceError::RetriesExhausted { attempts });
                }
                let delay = policy.delay(attempts);
                warn!("rate limited (attempt {attempts}), retrying in {delay:?}");
                sleep(delay);
            }
            other => return other,
        }
    }
}

/// Applies a [`RetryPolicy`] to every call of a source or broadcaster.
pub struct RateLimited<S> {
    inner: S,
    policy: RetryPolicy,
    sleep: fn(Duration),
}

impl<S> RateLimited<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            sleep: std::thread::sleep,
        }
    }

    /// Replace the blocking sleep, e.g. with a no-op in tests.
    pub fn with_sleeper(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: UtxoSource> UtxoSource for RateLimited<S> {
    fn fetch_unspent(&self, address: &str, confirmed_only: bool) -> Result<Vec<Utxo>, SourceError> {
        retry(&self.policy, self.sleep, || {
            self.inner.fetch_unspent(address, confirmed_only)
        })
    }
}

impl<S: Broadcaster> Broadcaster for RateLimited<S> {
    fn submit(&self, raw_tx: &[u8]) -> Result<String, SourceError> {
        retry(&self.policy, self.sleep, || self.inner.submit(raw_tx))
    }
}
