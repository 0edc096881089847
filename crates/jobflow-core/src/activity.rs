// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Activity contract between the engine and the task function wrapper.
//!
//! The engine creates an [`ActivityContext`] per attempt. The wrapper reads
//! its attempt number from it and publishes heartbeats through it; the engine
//! decides what a heartbeat means (see the embedded engine for an example).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::TaskError;
use crate::reporter::AttemptReporter;
use crate::task::{should_fail_attempt, sum_numbers};
use crate::types::{ComputeParams, JobId, JobOutput};

/// Activity type name of the summing activity.
pub const SUM_NUMBERS_ACTIVITY: &str = "sum_numbers";

/// Engine-provided facts about the current attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityInfo {
    /// Job (workflow instance) the activity belongs to.
    pub job_id: JobId,
    /// Activity type name.
    pub activity_type: String,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Receiver of heartbeat details. Implemented by engines.
///
/// Recording is fire-and-forget: implementations must not block and must
/// not report failures back to the attempt.
pub trait HeartbeatSink: Send + Sync {
    /// Record the latest heartbeat details of the attempt.
    fn record(&self, details: Vec<serde_json::Value>);
}

/// Per-attempt execution context.
#[derive(Clone)]
pub struct ActivityContext {
    info: ActivityInfo,
    sink: Arc<dyn HeartbeatSink>,
}

impl ActivityContext {
    /// Create a context for one attempt.
    pub fn new(info: ActivityInfo, sink: Arc<dyn HeartbeatSink>) -> Self {
        Self { info, sink }
    }

    /// Attempt facts.
    pub fn info(&self) -> &ActivityInfo {
        &self.info
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.info.attempt
    }

    /// Send a heartbeat with a single detail value.
    ///
    /// Never fails: an unserializable detail is logged and dropped.
    pub fn heartbeat<T: Serialize + ?Sized>(&self, detail: &T) {
        match serde_json::to_value(detail) {
            Ok(value) => self.sink.record(vec![value]),
            Err(e) => warn!(
                job_id = %self.info.job_id,
                attempt = self.info.attempt,
                error = %e,
                "Dropping heartbeat with unserializable details"
            ),
        }
    }
}

/// A retryable unit of work scheduled by the engine.
#[async_trait]
pub trait Activity: Send + Sync {
    /// Activity type name.
    fn name(&self) -> &str;

    /// Run one attempt.
    async fn execute(
        &self,
        ctx: &ActivityContext,
        params: &ComputeParams,
    ) -> Result<JobOutput, TaskError>;
}

/// Wrapper around [`sum_numbers`] that reports its attempt and optionally
/// simulates a long computation.
#[derive(Debug, Clone, Default)]
pub struct SumNumbersActivity {
    work_duration: Duration,
}

impl SumNumbersActivity {
    /// Create the activity with no simulated work.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each attempt open for `duration` after summing.
    pub fn with_work_duration(mut self, duration: Duration) -> Self {
        self.work_duration = duration;
        self
    }
}

#[async_trait]
impl Activity for SumNumbersActivity {
    fn name(&self) -> &str {
        SUM_NUMBERS_ACTIVITY
    }

    async fn execute(
        &self,
        ctx: &ActivityContext,
        params: &ComputeParams,
    ) -> Result<JobOutput, TaskError> {
        let attempt = AttemptReporter::new(ctx).report();
        info!(job_id = %ctx.info().job_id, attempt, "Activity attempt");

        if should_fail_attempt(attempt, params.fail_first_attempt) {
            return Err(TaskError::SimulatedFailure { attempt });
        }

        let result = sum_numbers(&params.numbers)?;

        if !self.work_duration.is_zero() {
            tokio::time::sleep(self.work_duration).await;
        }

        Ok(JobOutput { result, attempt })
    }
}
