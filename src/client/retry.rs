//! # Retry Policy
//!
//! Bounded retry with linear backoff, used by startup token validation.
//! Delays are computed per attempt; the caller owns the loop so it can stop
//! early on a conclusive result.
//!
//! ## Usage
//!
//! ```rust
//! use gavel::client::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::linear(3, Duration::from_secs(1));
//!
//! // Waits 1s after the first failure, 2s after the second, nothing after the last.
//! assert_eq!(policy.delay_after(1), Some(Duration::from_secs(1)));
//! assert_eq!(policy.delay_after(2), Some(Duration::from_secs(2)));
//! assert_eq!(policy.delay_after(3), None);
//! ```

use std::time::Duration;

/// Attempt bound plus a linear backoff unit: attempt `n` waits `n * unit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    unit: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn linear(max_attempts: u32, unit: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            unit,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn unit(&self) -> Duration {
        self.unit
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        (attempt < self.max_attempts).then(|| self.unit.saturating_mul(attempt.max(1)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_secs(1))
    }
}
