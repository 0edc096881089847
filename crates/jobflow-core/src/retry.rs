// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Retry policy and activity options.

use std::time::Duration;

use crate::error::{JobError, Result};

/// Retry policy attached to an activity invocation.
///
/// The engine runs the activity up to `max_attempts` times and waits
/// `initial_interval * backoff_coefficient^(k-1)`, capped at `max_interval`,
/// between attempt `k` and `k+1`. A coefficient of 1 gives a fixed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    max_interval: Duration,
    backoff_coefficient: f64,
}

impl RetryPolicy {
    /// Default attempt budget for compute jobs.
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// Create a validated policy.
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        max_interval: Duration,
        backoff_coefficient: f64,
    ) -> Result<Self> {
        if max_attempts == 0 {
            return Err(JobError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if max_interval < initial_interval {
            return Err(JobError::Config(format!(
                "max_interval ({}ms) must not be shorter than initial_interval ({}ms)",
                max_interval.as_millis(),
                initial_interval.as_millis()
            )));
        }
        if !backoff_coefficient.is_finite() || backoff_coefficient < 1.0 {
            return Err(JobError::Config(format!(
                "backoff_coefficient must be a finite value >= 1, got {}",
                backoff_coefficient
            )));
        }

        Ok(Self {
            max_attempts,
            initial_interval,
            max_interval,
            backoff_coefficient,
        })
    }

    /// Fixed-interval policy.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Result<Self> {
        Self::new(max_attempts, interval, interval, 1.0)
    }

    /// Maximum number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the first retry.
    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    /// Upper bound for any retry delay.
    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Backoff multiplier.
    pub fn backoff_coefficient(&self) -> f64 {
        self.backoff_coefficient
    }

    /// Whether another attempt may follow the given (1-based) attempt.
    pub fn allows_retry_after(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay between attempt `attempt` and `attempt + 1` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);

        if scaled.is_finite() && scaled < self.max_interval.as_secs_f64() {
            Duration::from_secs_f64(scaled)
        } else {
            self.max_interval
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            backoff_coefficient: 1.0,
        }
    }
}

/// Options the workflow passes along with each activity invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    retry_policy: RetryPolicy,
    start_to_close_timeout: Duration,
}

impl ActivityOptions {
    /// Default per-attempt deadline.
    pub const DEFAULT_START_TO_CLOSE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Create options with the default start-to-close timeout.
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            start_to_close_timeout: Self::DEFAULT_START_TO_CLOSE_TIMEOUT,
        }
    }

    /// Set the per-attempt deadline.
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    /// Retry policy.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Per-attempt deadline.
    pub fn start_to_close_timeout(&self) -> Duration {
        self.start_to_close_timeout
    }
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
