//! Bounded retries with exponential backoff.
//!
//! One coordinator wraps every venue call. The classifier decides which
//! failures are worth another attempt; exhausting attempts degrades the
//! affected cell to a retryable failure and never aborts the run.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::{Disposition, FetchError};
use crate::market_data::types::DepthSnapshot;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            base_delay: Duration::from_millis(c.base_delay_ms),
            backoff_factor: c.backoff_factor,
            max_delay: Duration::from_millis(c.max_delay_ms),
            jitter: c.jitter,
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt + 1`, given `attempt` (1-based) failed.
    /// With jitter the delay is drawn uniformly from `[d/2, d]`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        let nominal = self.base_delay.as_secs_f64() * exp;
        let capped = nominal.min(self.max_delay.as_secs_f64());
        let secs = if self.jitter && capped > 0.0 {
            rand::thread_rng().gen_range(capped / 2.0..=capped)
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

/// A failed call together with how many attempts it consumed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchFailure {
    pub error: FetchError,
    pub attempts: u32,
}

/// Tagged result of one logical call. Failures are never coerced to a default
/// value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum Outcome<T> {
    Success(T),
    RetryableFailure(FetchFailure),
    TerminalFailure(FetchFailure),
}

/// Outcome of one (venue, symbol) depth fetch.
pub type FetchOutcome = Outcome<DepthSnapshot>;

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Success(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            Outcome::Success(_) => None,
            Outcome::RetryableFailure(f) | Outcome::TerminalFailure(f) => Some(f),
        }
    }

    /// Outcome recorded for a call abandoned at the global deadline.
    pub fn timed_out(attempts: u32) -> Self {
        Outcome::RetryableFailure(FetchFailure { error: FetchError::Timeout, attempts })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Success(_) => "success",
            Outcome::RetryableFailure(_) => "retryable_failure",
            Outcome::TerminalFailure(_) => "terminal_failure",
        }
    }
}

/// Runs `op` until it succeeds, `classify` calls a failure terminal, or
/// `policy.max_attempts` is used up. `op` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut, C>(policy: &RetryPolicy, classify: C, mut op: F) -> Outcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    C: Fn(&FetchError) -> Disposition,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Outcome::Success(value),
            Err(error) => match classify(&error) {
                Disposition::Terminal => {
                    debug!(attempt, error = %error, "terminal failure, not retrying");
                    return Outcome::TerminalFailure(FetchFailure { error, attempts: attempt });
                }
                Disposition::Retryable if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %error, "retries exhausted");
                    return Outcome::RetryableFailure(FetchFailure { error, attempts: attempt });
                }
                Disposition::Retryable => {
                    let delay = policy.delay_after(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error, "retrying after backoff");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            },
        }
    }
}
