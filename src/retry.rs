//! Retry decisions and exponential backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::ClassifiedError;

/// Caller-supplied veto over retrying an otherwise retryable error.
pub type RetryPredicate = Arc<dyn Fn(&ClassifiedError) -> bool + Send + Sync>;

/// Decides whether a failed attempt is retried and how long to wait first.
///
/// Immutable once built; clone it freely and share it across calls.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Wait before the second attempt, in milliseconds.
    pub base_wait_ms: u64,
    /// Ceiling on any single wait, in milliseconds.
    pub max_wait_ms: u64,
    /// Total attempts per call, including the first. Every call makes at
    /// least one attempt, so `0` behaves like `1`.
    pub max_attempts: u32,
    /// Randomize each wait into `[wait / 2, wait]`.
    pub jitter: bool,
    retry_if: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_wait_ms: 250,
            max_wait_ms: 10_000,
            max_attempts: 6,
            jitter: false,
            retry_if: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("base_wait_ms", &self.base_wait_ms)
            .field("max_wait_ms", &self.max_wait_ms)
            .field("max_attempts", &self.max_attempts)
            .field("jitter", &self.jitter)
            .field("retry_if", &self.retry_if.as_ref().map(|_| "<predicate>"))
            .finish()
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the attempt cap, clamped to at least 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the wait before the second attempt.
    pub fn with_base_wait_ms(mut self, base_wait_ms: u64) -> Self {
        self.base_wait_ms = base_wait_ms;
        self
    }

    /// Sets the ceiling on a single wait.
    pub fn with_max_wait_ms(mut self, max_wait_ms: u64) -> Self {
        self.max_wait_ms = max_wait_ms;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Restricts retries further: an error is only retried when `predicate`
    /// also returns true. Terminal errors are never retried regardless.
    pub fn with_retry_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&ClassifiedError) -> bool + Send + Sync + 'static,
    {
        self.retry_if = Some(Arc::new(predicate));
        self
    }

    /// Whether the call should try again after `error` failed attempt `attempt` (1-based).
    pub fn should_retry(&self, error: &ClassifiedError, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        if error.is_terminal() || error.is_cancelled() {
            return false;
        }
        self.retry_if
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    /// `min(base_wait_ms * 2^(attempt-1), max_wait_ms)`.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63);
        let wait_ms = self
            .base_wait_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_wait_ms);
        Duration::from_millis(wait_ms)
    }

    /// The sleep actually taken after attempt `attempt`: [`wait_for`](Self::wait_for),
    /// jittered when enabled.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let wait = self.wait_for(attempt);
        if !self.jitter || wait.is_zero() {
            return wait;
        }
        let wait_ms = wait.as_millis() as u64;
        Duration::from_millis(rand::thread_rng().gen_range(wait_ms / 2..=wait_ms))
    }
}
