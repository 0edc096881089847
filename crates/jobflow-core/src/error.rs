// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for jobflow-core.
//!
//! Three layers of errors exist:
//! - [`JobError`] is what the gateway sees (submit/status operations).
//! - [`EngineError`] is what the orchestration engine client reports. Each
//!   variant carries a [`Severity`] so best-effort reads can degrade instead
//!   of failing the whole status query.
//! - [`TaskError`] is a single failed activity attempt; [`ActivityFailure`]
//!   is the terminal failure once the retry policy gives up.

use thiserror::Error;

/// Result type using JobError.
pub type Result<T> = std::result::Result<T, JobError>;

/// Result type for orchestration engine calls.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Client-facing errors returned by submission and status operations.
#[derive(Debug, Error)]
pub enum JobError {
    /// Request failed validation before any engine interaction.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The engine has no record of the job.
    #[error("job not found: {0}")]
    NotFound(String),

    /// The orchestration engine cannot be reached (or a mandatory call timed out).
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Anything else: malformed engine responses, id collisions.
    #[error("internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::EngineUnavailable(_) => "engine_unavailable",
            Self::Config(_) => "config_error",
            Self::Internal(_) => "internal",
        }
    }
}

/// How an engine error affects a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The request cannot be answered.
    Hard,
    /// Only the live-instance view is missing; the execution record is fine.
    Soft,
}

/// Errors reported by an [`OrchestrationService`](crate::engine::OrchestrationService).
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// No execution with this id.
    #[error("execution not found: {0}")]
    NotFound(String),

    /// An execution with this id already exists.
    #[error("execution already started: {0}")]
    AlreadyStarted(String),

    /// Connection-level failure talking to the engine.
    #[error("engine unavailable: {0}")]
    Unavailable(String),

    /// The worker hosting the instance cannot answer queries.
    #[error("worker unreachable for {job_id}: {reason}")]
    WorkerUnreachable {
        /// Job whose worker could not be reached.
        job_id: String,
        /// Reason reported by the engine.
        reason: String,
    },

    /// The instance could not answer the query (unknown name, bad payload).
    #[error("query '{query}' rejected: {reason}")]
    QueryRejected {
        /// Query name.
        query: String,
        /// Rejection reason.
        reason: String,
    },

    /// Caller-side timeout on an engine round trip.
    #[error("request timed out after {0}ms")]
    Timeout(u64),

    /// The workflow reached a failed terminal state.
    #[error("workflow execution failed: {0}")]
    WorkflowFailed(String),

    /// Payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EngineError {
    /// Classify the error for best-effort reads.
    ///
    /// Only consulted on optional steps of a status query; mandatory steps
    /// propagate every error regardless of severity.
    pub fn severity(&self) -> Severity {
        match self {
            Self::WorkerUnreachable { .. } | Self::QueryRejected { .. } | Self::Timeout(_) => {
                Severity::Soft
            }
            Self::NotFound(_)
            | Self::AlreadyStarted(_)
            | Self::Unavailable(_)
            | Self::WorkflowFailed(_)
            | Self::Serialization(_) => Severity::Hard,
        }
    }

    /// Returns true if a best-effort read may swallow this error.
    pub fn is_soft(&self) -> bool {
        self.severity() == Severity::Soft
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<EngineError> for JobError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => JobError::NotFound(id),
            EngineError::Unavailable(reason) => JobError::EngineUnavailable(reason),
            EngineError::Timeout(ms) => {
                JobError::EngineUnavailable(format!("engine request timed out after {}ms", ms))
            }
            other => JobError::Internal(other.to_string()),
        }
    }
}

/// A single failed attempt of the task function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// Test-only failure injected on the first attempt.
    #[error("simulated failure on attempt {attempt}")]
    SimulatedFailure {
        /// Attempt that was failed on purpose.
        attempt: u32,
    },

    /// The sum does not fit in an i64.
    #[error("sum overflows a 64-bit integer")]
    Overflow,

    /// Activity input could not be decoded.
    #[error("invalid activity input: {0}")]
    InvalidInput(String),

    /// The attempt ran past its start-to-close timeout.
    #[error("attempt {attempt} exceeded start-to-close timeout of {timeout_ms}ms")]
    Timeout {
        /// Attempt that timed out.
        attempt: u32,
        /// Configured timeout.
        timeout_ms: u64,
    },
}

impl TaskError {
    /// Whether retrying could change the outcome.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::SimulatedFailure { .. } | Self::Timeout { .. } => true,
            Self::Overflow | Self::InvalidInput(_) => false,
        }
    }
}

/// Terminal failure of an activity after the retry policy stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("activity '{activity}' failed after {attempts} attempt(s): {cause}")]
pub struct ActivityFailure {
    /// Activity type name.
    pub activity: String,
    /// Attempts actually made.
    pub attempts: u32,
    /// Error of the last attempt.
    pub cause: TaskError,
}
