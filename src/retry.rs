use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::MinerError;

/// Capped exponential backoff for transient collaborator failures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub base_backoff_ms: u64,
    /// Upper bound on any single delay.
    pub max_backoff_ms: u64,
}

/// Delay schedule between attempts.
pub trait BackoffPolicy {
    /// Delay before retry number `attempt` (1-based).
    fn delay_for_attempt(&self, attempt: usize) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never waits, for tests and offline collaborators.
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31) as u32;
        let delay = self
            .base_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Outcome of one attempt as seen by `run_with_retry`.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// Finished.
    Done(T),
    /// Retry after backoff while attempts remain.
    Transient(E),
    /// Stop immediately.
    Fatal(E),
}

impl<T> From<Result<T, MinerError>> for Attempt<T, MinerError> {
    /// Retry only failures that `MinerError::is_transient` marks retryable.
    fn from(result: Result<T, MinerError>) -> Self {
        match result {
            Ok(value) => Attempt::Done(value),
            Err(err) if err.is_transient() => Attempt::Transient(err),
            Err(err) => Attempt::Fatal(err),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or the attempt ceiling is hit.
///
/// The last transient error is returned once attempts are exhausted.
pub fn run_with_retry<T, E, F>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(usize) -> Attempt<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Attempt::Done(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Transient(err) => {
                if attempt >= max_attempts {
                    warn!(
                        "[biobroker:retry] {label} giving up after {attempt} attempts: {err}"
                    );
                    return Err(err);
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "[biobroker:retry] {label} attempt {attempt}/{max_attempts} failed: {err}; retrying in {}ms",
                    delay.as_millis()
                );
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
        }
    }
}
