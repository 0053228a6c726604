//! Retry loop shared by every connection manager primitive

use crate::config::RetrySettings;
use crate::{Error, Result};
use nutype::nutype;
use rand::Rng;
#[allow(unused_imports)] // These are used by nutype derive macros
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Total attempts for one operation, including the first
#[nutype(
    validate(predicate = |attempts: &u32| *attempts > 0),
    derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRef, Display)
)]
pub struct MaxAttempts(u32);

/// Exponential backoff with a ceiling and optional jitter.
///
/// The policy is immutable; each call to [`RetryPolicy::run`] walks its own
/// delay sequence, so concurrent callers never share backoff state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    // Always at least 1; only set from a `MaxAttempts` or the default
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl TryFrom<&RetrySettings> for RetryPolicy {
    type Error = Error;

    fn try_from(settings: &RetrySettings) -> Result<Self> {
        let max_attempts = MaxAttempts::try_new(settings.max_attempts)
            .map_err(|_| Error::validation("retry.max_attempts", "must be at least 1"))?;

        Ok(Self::new(
            max_attempts,
            Duration::from_millis(settings.base_delay_ms),
            Duration::from_millis(settings.max_delay_ms),
        )
        .with_jitter(settings.jitter))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: MaxAttempts, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.into_inner(),
            base_delay,
            max_delay: max_delay.max(base_delay),
            jitter: true,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Un-jittered delay after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay actually slept after failed attempt `attempt`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.backoff(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let half = delay / 2;
        let spread = rand::thread_rng().gen_range(0..=half.as_micros() as u64);
        half + Duration::from_micros(spread)
    }

    /// Run `attempt` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// Only errors classified by [`is_transient`] are retried. A permanent error
    /// is returned immediately as [`Error::Database`]; an exhausted budget
    /// yields [`Error::Transient`] carrying the last error.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        let max_attempts = self.max_attempts();
        let mut current = 1;

        loop {
            match attempt().await {
                Ok(value) => {
                    if current > 1 {
                        debug!(operation, attempt = current, "Database operation recovered");
                    }
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => return Err(Error::Database(e)),
                Err(e) if current >= max_attempts => {
                    return Err(Error::Transient {
                        operation,
                        attempts: max_attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.delay_for(current);
                    warn!(
                        operation,
                        attempt = current,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Database attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    current += 1;
                }
            }
        }
    }
}

/// Whether an error is worth retrying: transport, pool, and server-availability
/// failures are; constraint violations, decode errors, and missing rows are not.
pub fn is_transient(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db.code().is_some_and(|code| is_transient_sqlstate(&code)),
        _ => false,
    }
}

fn is_transient_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("53")
        || matches!(code, "40001" | "40P01" | "57P01" | "57P02" | "57P03")
}
