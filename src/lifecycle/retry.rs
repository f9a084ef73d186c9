//! Retry schedule for transient store failures.

use std::time::Duration;

/// Wait applied between attempts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait `attempt × step` after attempt `attempt`.
    Linear {
        /// Increment per attempt.
        step: Duration,
    },
}

/// Bounded retry schedule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below one act as one.
    pub max_attempts: u32,
    /// Wait schedule between attempts.
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Attempts made by [`RetryPolicy::default`].
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    /// Linear step used by [`RetryPolicy::default`].
    pub const DEFAULT_STEP: Duration = Duration::from_secs(1);

    /// Builds a linear policy.
    #[must_use]
    pub const fn linear(max_attempts: u32, step: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Linear { step },
        }
    }

    /// Returns the effective attempt budget.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Returns the wait after the 1-based `attempt`.
    #[must_use]
    pub const fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Linear { step } => step.saturating_mul(attempt),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(Self::DEFAULT_MAX_ATTEMPTS, Self::DEFAULT_STEP)
    }
}
