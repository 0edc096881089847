// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Jobflow core - durable job orchestration with status reconciliation.
//!
//! A client submits a list of integers; a durable workflow instance sums them
//! inside a single retried activity and the client polls a reconciled status
//! view until the job reaches a terminal state.
//!
//! # Components
//!
//! - **Workflow**: [`JobWorkflow`] tracks the job stage
//!   (`pending → computing → completed | failed`) and answers the
//!   `get_job_config` and `get_progress` queries while suspended
//! - **Activity**: [`SumNumbersActivity`] heartbeats its attempt number
//!   through [`AttemptReporter`] and then runs the task function
//! - **Retry**: [`RetryPolicy`] and [`ActivityOptions`] bound the number of
//!   attempts, the backoff between them and each attempt's duration
//! - **Engine**: [`OrchestrationService`] is the engine client;
//!   `EmbeddedEngine` (feature `embedded`) runs everything in-process
//! - **Reconciler**: [`StatusReconciler`] merges the execution description,
//!   live queries, pending-activity heartbeats and the terminal output
//!   into one [`JobStatus`]
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use jobflow_core::{
//!     ComputeParams, EmbeddedEngine, JobService, OrchestrationService, ReconcilerConfig,
//!     WorkerConfig,
//! };
//!
//! let engine = EmbeddedEngine::from_config(&WorkerConfig::from_env()?)?;
//! engine.connect().await?;
//!
//! let service = JobService::new(Arc::new(engine), &ReconcilerConfig::from_env()?);
//! let job_id = service.submit(ComputeParams::new(vec![1, 2, 3])).await?;
//!
//! let status = service.status(&job_id).await?;
//! println!("{} {}", status.status, status.progress.stage);
//! ```
//!
//! # Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `JOBFLOW_MAX_ATTEMPTS` | `5` | Activity attempts before the job fails |
//! | `JOBFLOW_INITIAL_INTERVAL_MS` | `1000` | Delay before the first retry |
//! | `JOBFLOW_MAX_INTERVAL_MS` | `10000` | Retry delay cap |
//! | `JOBFLOW_BACKOFF_COEFFICIENT` | `1.0` | Backoff multiplier |
//! | `JOBFLOW_ACTIVITY_TIMEOUT_MS` | `60000` | Start-to-close timeout per attempt |
//! | `JOBFLOW_WORK_DURATION_MS` | `0` | Simulated work per attempt |
//! | `JOBFLOW_RETENTION_MS` | unset | Time closed executions stay queryable (embedded engine) |
//! | `JOBFLOW_RPC_TIMEOUT_MS` | `5000` | Timeout per engine call during reconciliation |

mod activity;
mod config;
mod error;
mod reconciler;
mod reporter;
mod retry;
mod service;
mod submission;
mod task;
mod types;
mod workflow;

pub mod engine;

// Main types
pub use error::{ActivityFailure, EngineError, EngineResult, JobError, Result, Severity, TaskError};
pub use service::JobService;
pub use types::{
    ComputeParams, ExecutionStatus, JobConfig, JobId, JobOutput, JobProgress, JobStatus,
    ProgressSnapshot, ReportedStage, Stage, WorkflowOutput,
};

// Configuration
pub use config::{ReconcilerConfig, WorkerConfig};
pub use retry::{ActivityOptions, RetryPolicy};

// Workflow and activity
pub use activity::{
    Activity, ActivityContext, ActivityInfo, HeartbeatSink, SUM_NUMBERS_ACTIVITY,
    SumNumbersActivity,
};
pub use reporter::{AttemptReporter, decode_attempt};
pub use task::{should_fail_attempt, sum_numbers};
pub use workflow::{
    GET_JOB_CONFIG_QUERY, GET_PROGRESS_QUERY, JobQueries, JobWorkflow, WorkflowContext,
};

// Engine client and reconciliation
pub use engine::{ExecutionDescription, OrchestrationService, PendingActivity};
pub use reconciler::{FALLBACK_FAILED_ATTEMPTS, FAILED_JOB_MESSAGE, StatusReconciler};
pub use submission::JobSubmitter;

#[cfg(feature = "embedded")]
pub use engine::embedded::EmbeddedEngine;
