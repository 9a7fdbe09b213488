//! Retry policy: decides whether a failed job gets another attempt and how
//! long it waits first.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BackoffStrategy {
    /// `base`
    Fixed,
    /// `(attempts + 1) * base`
    Linear,
    /// `(attempts + 1)^2 * base`
    Exponential,
}

/// Retry policy owned by a single job.
///
/// `attempts` in every method is the number of attempts already made.
/// Example with `{max 3, base 1s, Exponential}`:
/// - 1 attempt made: 4s
/// - 2 attempts made: 9s (5s with a 5s cap)
/// - 3 attempts made: no retry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    strategy: BackoffStrategy,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        strategy: BackoffStrategy,
    ) -> Result<Self, JobError> {
        if max_attempts == 0 {
            return Err(JobError::InvalidRetryPolicy(
                "max_attempts must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
            strategy,
            max_delay: None,
        })
    }

    pub fn fixed(max_attempts: u32, base_delay: Duration) -> Result<Self, JobError> {
        Self::new(max_attempts, base_delay, BackoffStrategy::Fixed)
    }

    pub fn linear(max_attempts: u32, base_delay: Duration) -> Result<Self, JobError> {
        Self::new(max_attempts, base_delay, BackoffStrategy::Linear)
    }

    pub fn exponential(max_attempts: u32, base_delay: Duration) -> Result<Self, JobError> {
        Self::new(max_attempts, base_delay, BackoffStrategy::Exponential)
    }

    /// Cap every computed delay at `max_delay`.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn strategy(&self) -> BackoffStrategy {
        self.strategy
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }

    /// Delay before the next attempt; zero once the budget is spent.
    pub fn calculate_delay(&self, attempts: u32) -> Duration {
        if !self.should_retry(attempts) {
            return Duration::ZERO;
        }

        let base = self.base_delay.as_millis();
        let factor = u128::from(attempts) + 1;
        let millis = match self.strategy {
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base.saturating_mul(factor),
            BackoffStrategy::Exponential => base.saturating_mul(factor.saturating_mul(factor)),
        };
        let delay = Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX));

        match self.max_delay {
            Some(cap) => delay.min(cap),
            None => delay,
        }
    }
}
