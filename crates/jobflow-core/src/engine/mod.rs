// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Orchestration engine client interface.
//!
//! This module abstracts the durable-execution engine the core runs on:
//! - `embedded`: in-process, in-memory engine (feature `embedded`)
//!
//! Submission and status reconciliation only ever talk to the engine through
//! [`OrchestrationService`], so any engine with a Temporal-like client API
//! (start, describe, query, result, pending-activity introspection) can be
//! plugged in.

#[cfg(feature = "embedded")]
pub mod embedded;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineResult;
use crate::types::{ComputeParams, ExecutionStatus, JobId};

/// Engine-level description of a workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDescription {
    /// Execution id.
    pub job_id: JobId,
    /// Engine status.
    pub status: ExecutionStatus,
    /// When the execution started.
    pub started_at: DateTime<Utc>,
    /// When the execution closed (terminal statuses only).
    pub closed_at: Option<DateTime<Utc>>,
    /// Activity attempts the engine actually dispatched, if it tracks them.
    pub activity_attempts: Option<u32>,
}

/// An activity scheduled or running for an open execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingActivity {
    /// Activity id within the execution.
    pub activity_id: String,
    /// Activity type name.
    pub activity_type: String,
    /// Engine attempt counter (1-based).
    pub attempt: u32,
    /// Most recent heartbeat details; empty when none was recorded.
    pub heartbeat_details: Vec<Value>,
    /// When the last heartbeat was recorded.
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    /// Failure message of the previous attempt, if any.
    pub last_failure: Option<String>,
}

/// Client API of a durable orchestration engine.
///
/// Implementations are explicitly constructed and injected; callers own the
/// connect/close lifecycle.
#[async_trait]
pub trait OrchestrationService: Send + Sync {
    /// Connect to the engine.
    async fn connect(&self) -> EngineResult<()>;

    /// Check if connected.
    async fn is_connected(&self) -> bool;

    /// Close the connection. Running executions are not affected.
    async fn close(&self);

    /// Start a job workflow instance with the given id.
    async fn start_workflow(&self, job_id: &JobId, params: &ComputeParams) -> EngineResult<()>;

    /// Describe an execution. Fails with `NotFound` for unknown ids.
    async fn describe(&self, job_id: &JobId) -> EngineResult<ExecutionDescription>;

    /// Query a live instance. Fails with `WorkerUnreachable` when the hosting
    /// worker cannot answer.
    async fn query(&self, job_id: &JobId, query: &str) -> EngineResult<Value>;

    /// Wait for and return the terminal output of an execution.
    async fn result(&self, job_id: &JobId) -> EngineResult<Value>;

    /// List pending activities of an open execution.
    async fn pending_activities(&self, job_id: &JobId) -> EngineResult<Vec<PendingActivity>>;
}
