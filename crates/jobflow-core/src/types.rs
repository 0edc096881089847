// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! High-level types shared by the workflow, the engine and the reconciler.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{JobError, Result};

/// Opaque job identifier, also used as the durable instance id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Generate a fresh id (`job-<uuid v4>`).
    pub fn generate() -> Self {
        Self(format!("job-{}", Uuid::new_v4()))
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for JobId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for JobId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Input of a compute job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeParams {
    /// Numbers to sum. Must not be empty.
    pub numbers: Vec<i64>,
    /// Fail the first attempt on purpose (test scaffolding).
    #[serde(default)]
    pub fail_first_attempt: bool,
}

impl ComputeParams {
    /// Create params for the given numbers.
    pub fn new(numbers: Vec<i64>) -> Self {
        Self {
            numbers,
            fail_first_attempt: false,
        }
    }

    /// Set the simulated first-attempt failure switch.
    pub fn with_fail_first_attempt(mut self, fail: bool) -> Self {
        self.fail_first_attempt = fail;
        self
    }

    /// Reject params that must never reach the engine.
    pub fn validate(&self) -> Result<()> {
        if self.numbers.is_empty() {
            return Err(JobError::InvalidInput(
                "numbers must contain at least one value".to_string(),
            ));
        }
        Ok(())
    }
}

/// Stage of a running job workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Instance created, run not entered yet.
    Pending,
    /// Activity scheduled or executing.
    Computing,
    /// Activity succeeded.
    Completed,
    /// Activity exhausted its retries.
    Failed,
}

impl Stage {
    /// Wire name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Computing => "computing",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    /// Check if this is a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of the `get_job_config` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Maximum attempts of the retry policy held by the instance.
    pub max_attempts: u32,
}

/// Response of the `get_progress` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// In-memory stage of the instance.
    pub stage: Stage,
}

fn first_attempt() -> u32 {
    1
}

/// Structured terminal result of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutput {
    /// Sum of the input numbers.
    pub result: i64,
    /// Attempt at which the activity succeeded.
    #[serde(default = "first_attempt")]
    pub attempt: u32,
}

/// Terminal workflow output as stored by the engine.
///
/// Older workflow versions returned the bare sum. Decode through this type
/// and call [`WorkflowOutput::into_current`] instead of inspecting JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkflowOutput {
    /// `{"result": .., "attempt": ..}`
    Structured(JobOutput),
    /// Bare integer.
    Legacy(i64),
}

impl WorkflowOutput {
    /// Decode an engine payload.
    pub fn decode(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Migrate to the current shape. Legacy outputs never retried.
    pub fn into_current(self) -> JobOutput {
        match self {
            WorkflowOutput::Structured(output) => output,
            WorkflowOutput::Legacy(result) => JobOutput {
                result,
                attempt: first_attempt(),
            },
        }
    }
}

impl From<JobOutput> for WorkflowOutput {
    fn from(output: JobOutput) -> Self {
        WorkflowOutput::Structured(output)
    }
}

/// Engine-level execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Instance is executing or waiting on an activity.
    Running,
    /// Instance returned a result.
    Completed,
    /// Instance returned a failure.
    Failed,
    /// Instance was cancelled.
    Canceled,
    /// Instance was terminated by an operator.
    Terminated,
    /// Instance continued as a new run.
    ContinuedAsNew,
    /// Instance hit its execution timeout.
    TimedOut,
}

impl ExecutionStatus {
    /// Engine vocabulary name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Completed => "COMPLETED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Canceled => "CANCELED",
            ExecutionStatus::Terminated => "TERMINATED",
            ExecutionStatus::ContinuedAsNew => "CONTINUED_AS_NEW",
            ExecutionStatus::TimedOut => "TIMED_OUT",
        }
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ExecutionStatus::Running)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedStage {
    /// Stage read from the instance, or forced for terminal statuses.
    Live(Stage),
    /// Execution is running but its worker did not answer.
    WorkerUnreachable,
    /// Nothing known.
    Unknown,
}

impl fmt::Display for ReportedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportedStage::Live(stage) => f.write_str(stage.as_str()),
            ReportedStage::WorkerUnreachable => f.write_str("computing (worker unreachable)"),
            ReportedStage::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for ReportedStage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl From<Stage> for ReportedStage {
    fn from(stage: Stage) -> Self {
        ReportedStage::Live(stage)
    }
}

/// Progress part of a reconciled status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    /// Current stage.
    pub stage: ReportedStage,
    /// Current attempt, 0 when not known.
    pub attempt: u32,
}

impl JobProgress {
    /// Progress with nothing known yet.
    pub fn unknown() -> Self {
        Self {
            stage: ReportedStage::Unknown,
            attempt: 0,
        }
    }
}

/// Reconciled, client-facing job status. Rebuilt on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    /// Job id.
    pub job_id: JobId,
    /// Engine-level status.
    pub status: ExecutionStatus,
    /// Stage and attempt.
    pub progress: JobProgress,
    /// Sum, once completed.
    pub result: Option<i64>,
    /// Error message, once failed.
    pub error: Option<String>,
}
