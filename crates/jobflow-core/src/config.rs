// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the job worker and the status reconciler.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{JobError, Result};
use crate::retry::{ActivityOptions, RetryPolicy};

fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| JobError::Config(format!("invalid {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

/// Settings of the workflow worker: retry policy, attempt deadline and
/// simulated work.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Maximum activity attempts (default: 5).
    pub max_attempts: u32,
    /// Delay before the first retry (default: 1s).
    pub initial_interval: Duration,
    /// Retry delay cap (default: 10s).
    pub max_interval: Duration,
    /// Backoff multiplier (default: 1.0, fixed interval).
    pub backoff_coefficient: f64,
    /// Per-attempt start-to-close timeout (default: 60s).
    pub activity_timeout: Duration,
    /// Time each attempt is held open after computing (default: 0).
    pub work_duration: Duration,
    /// How long closed executions stay queryable (default: forever).
    pub retention: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryPolicy::DEFAULT_MAX_ATTEMPTS,
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
            backoff_coefficient: 1.0,
            activity_timeout: ActivityOptions::DEFAULT_START_TO_CLOSE_TIMEOUT,
            work_duration: Duration::ZERO,
            retention: None,
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `JOBFLOW_MAX_ATTEMPTS` (default: 5)
    /// - `JOBFLOW_INITIAL_INTERVAL_MS` (default: 1000)
    /// - `JOBFLOW_MAX_INTERVAL_MS` (default: 10000)
    /// - `JOBFLOW_BACKOFF_COEFFICIENT` (default: 1.0)
    /// - `JOBFLOW_ACTIVITY_TIMEOUT_MS` (default: 60000)
    /// - `JOBFLOW_WORK_DURATION_MS` (default: 0)
    /// - `JOBFLOW_RETENTION_MS` (default: unset, keep forever; 0 also keeps forever)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            max_attempts: env_or("JOBFLOW_MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_interval: Duration::from_millis(env_or(
                "JOBFLOW_INITIAL_INTERVAL_MS",
                defaults.initial_interval.as_millis() as u64,
            )?),
            max_interval: Duration::from_millis(env_or(
                "JOBFLOW_MAX_INTERVAL_MS",
                defaults.max_interval.as_millis() as u64,
            )?),
            backoff_coefficient: env_or(
                "JOBFLOW_BACKOFF_COEFFICIENT",
                defaults.backoff_coefficient,
            )?,
            activity_timeout: Duration::from_millis(env_or(
                "JOBFLOW_ACTIVITY_TIMEOUT_MS",
                defaults.activity_timeout.as_millis() as u64,
            )?),
            work_duration: Duration::from_millis(env_or(
                "JOBFLOW_WORK_DURATION_MS",
                defaults.work_duration.as_millis() as u64,
            )?),
            retention: match env_or("JOBFLOW_RETENTION_MS", 0u64)? {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        };

        // Fail at startup rather than on the first job.
        config.retry_policy()?;
        Ok(config)
    }

    /// Set the maximum number of attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the retry intervals.
    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    /// Set the per-attempt timeout.
    pub fn with_activity_timeout(mut self, timeout: Duration) -> Self {
        self.activity_timeout = timeout;
        self
    }

    /// Set the simulated work duration.
    pub fn with_work_duration(mut self, duration: Duration) -> Self {
        self.work_duration = duration;
        self
    }

    /// Drop closed executions after `retention`.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Build the validated retry policy.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_attempts,
            self.initial_interval,
            self.max_interval,
            self.backoff_coefficient,
        )
    }

    /// Build the activity options used by every workflow instance.
    pub fn activity_options(&self) -> Result<ActivityOptions> {
        Ok(ActivityOptions::new(self.retry_policy()?)
            .with_start_to_close_timeout(self.activity_timeout))
    }
}

/// Settings of the status reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Timeout applied to every engine round trip (default: 5s).
    pub rpc_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            rpc_timeout: Duration::from_secs(5),
        }
    }
}

impl ReconcilerConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `JOBFLOW_RPC_TIMEOUT_MS` (default: 5000)
    pub fn from_env() -> Result<Self> {
        let rpc_timeout_ms: u64 = env_or("JOBFLOW_RPC_TIMEOUT_MS", 5_000)?;
        if rpc_timeout_ms == 0 {
            return Err(JobError::Config(
                "JOBFLOW_RPC_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            rpc_timeout: Duration::from_millis(rpc_timeout_ms),
        })
    }

    /// Set the per-call timeout.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_config() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.activity_timeout, Duration::from_secs(60));
        assert_eq!(config.work_duration, Duration::ZERO);
        assert_eq!(config.retention, None);

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy, RetryPolicy::default());
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::new()
            .with_max_attempts(3)
            .with_intervals(Duration::from_millis(100), Duration::from_secs(2))
            .with_backoff_coefficient(2.0)
            .with_activity_timeout(Duration::from_secs(5))
            .with_work_duration(Duration::from_millis(250))
            .with_retention(Duration::from_secs(3600));

        let options = config.activity_options().unwrap();
        assert_eq!(options.retry_policy().max_attempts(), 3);
        assert_eq!(options.retry_policy().delay_after(2), Duration::from_millis(200));
        assert_eq!(options.start_to_close_timeout(), Duration::from_secs(5));
        assert_eq!(config.retention, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_worker_config_rejects_invalid_policy() {
        let config = WorkerConfig::new().with_max_attempts(0);
        assert!(matches!(config.activity_options(), Err(JobError::Config(_))));
    }

    #[test]
    fn test_reconciler_config_builder() {
        let config = ReconcilerConfig::new().with_rpc_timeout(Duration::from_millis(750));
        assert_eq!(config.rpc_timeout, Duration::from_millis(750));
        assert_eq!(ReconcilerConfig::default().rpc_timeout, Duration::from_secs(5));
    }
}
