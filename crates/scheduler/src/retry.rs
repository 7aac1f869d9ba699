//! Bounded retry for engines that are not ready yet

use std::time::{Duration, Instant};

/// How often and how long to wait before retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Exactly one retry after `delay`
    pub fn once_after(delay: Duration) -> Self {
        Self { max_retries: 1, delay }
    }

    /// Start tracking attempts for one operation
    pub fn start(&self) -> RetryState {
        RetryState { policy: *self, retries: 0 }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once_after(Duration::from_millis(250))
    }
}

/// Attempts made so far for one operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    policy: RetryPolicy,
    retries: u32,
}

impl RetryState {
    /// Record a failed attempt at `now`
    ///
    /// Returns when to try again, or `None` once the retries are used up.
    pub fn schedule(&mut self, now: Instant) -> Option<Instant> {
        if self.retries >= self.policy.max_retries {
            return None;
        }
        self.retries += 1;
        Some(now + self.policy.delay)
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }
}
