// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Status reconciliation.
//!
//! A job's status is spread over three engine views that overlap only
//! partially:
//!
//! 1. the execution description (authoritative status, always available
//!    while the engine is),
//! 2. the live instance (stage and config queries, available only while its
//!    worker is reachable) plus pending-activity introspection (attempt and
//!    heartbeat of the in-flight attempt),
//! 3. the terminal output (only once completed).
//!
//! [`StatusReconciler::reconcile`] merges them into one [`JobStatus`]. Steps
//! reading view 2 are best-effort: soft engine errors degrade the progress
//! fields instead of failing the request.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::config::ReconcilerConfig;
use crate::engine::{ExecutionDescription, OrchestrationService};
use crate::error::{EngineError, EngineResult, JobError, Result};
use crate::reporter::decode_attempt;
use crate::types::{
    ExecutionStatus, JobConfig, JobId, JobOutput, JobProgress, JobStatus, ProgressSnapshot,
    ReportedStage, Stage, WorkflowOutput,
};
use crate::workflow::{GET_JOB_CONFIG_QUERY, GET_PROGRESS_QUERY};

/// Error message reported for failed jobs.
pub const FAILED_JOB_MESSAGE: &str = "Workflow execution failed";

/// Attempt count reported for a failed job when neither the engine nor the
/// instance can tell how many attempts were made.
pub const FALLBACK_FAILED_ATTEMPTS: u32 = 3;

/// Builds client-facing job status from engine state. Stateless.
#[derive(Clone)]
pub struct StatusReconciler {
    engine: Arc<dyn OrchestrationService>,
    rpc_timeout: Duration,
}

impl StatusReconciler {
    /// Create a reconciler over the given engine client.
    pub fn new(engine: Arc<dyn OrchestrationService>, config: &ReconcilerConfig) -> Self {
        Self {
            engine,
            rpc_timeout: config.rpc_timeout,
        }
    }

    /// Reconcile the current status of a job.
    ///
    /// Fails with [`JobError::NotFound`] for unknown ids and
    /// [`JobError::EngineUnavailable`] when the engine itself cannot be
    /// reached or a mandatory call times out.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn reconcile(&self, job_id: &JobId) -> Result<JobStatus> {
        let description = self.call(self.engine.describe(job_id)).await?;
        let status = description.status;

        let mut progress = JobProgress::unknown();
        let mut result = None;
        let mut error = None;

        if status != ExecutionStatus::Completed {
            progress.stage = self.live_stage(job_id, status).await?;
        }

        match status {
            ExecutionStatus::Running => {
                progress.attempt = self.in_flight_attempt(job_id, &description).await?;
            }
            ExecutionStatus::Completed => {
                let output = self.terminal_output(job_id).await?;
                progress.stage = ReportedStage::Live(Stage::Completed);
                progress.attempt = output.attempt;
                result = Some(output.result);
            }
            ExecutionStatus::Failed => {
                progress.stage = ReportedStage::Live(Stage::Failed);
                progress.attempt = self.failed_attempts(job_id, &description).await?;
                error = Some(FAILED_JOB_MESSAGE.to_string());
            }
            _ => {}
        }

        debug!(
            status = %status,
            stage = %progress.stage,
            attempt = progress.attempt,
            "Status reconciled"
        );

        Ok(JobStatus {
            job_id: job_id.clone(),
            status,
            progress,
            result,
            error,
        })
    }

    /// Run one engine round trip under the configured timeout.
    async fn call<T>(&self, request: impl Future<Output = EngineResult<T>>) -> EngineResult<T> {
        match tokio::time::timeout(self.rpc_timeout, request).await {
            Ok(response) => response,
            Err(_) => Err(EngineError::Timeout(self.rpc_timeout.as_millis() as u64)),
        }
    }

    /// Run an optional round trip: soft errors yield `None`, hard ones propagate.
    async fn best_effort<T>(
        &self,
        step: &'static str,
        request: impl Future<Output = EngineResult<T>>,
    ) -> EngineResult<Option<T>> {
        match self.call(request).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_soft() => {
                warn!(step, error = %e, "Best-effort engine call degraded");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Query the live instance and decode the response; decode failures are soft.
    async fn query_live<T: DeserializeOwned>(
        &self,
        job_id: &JobId,
        query: &'static str,
    ) -> EngineResult<Option<T>> {
        let Some(value) = self
            .best_effort(query, self.engine.query(job_id, query))
            .await?
        else {
            return Ok(None);
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Ok(Some(decoded)),
            Err(e) => {
                warn!(query, error = %e, "Ignoring malformed query response");
                Ok(None)
            }
        }
    }

    async fn live_stage(&self, job_id: &JobId, status: ExecutionStatus) -> Result<ReportedStage> {
        let snapshot: Option<ProgressSnapshot> =
            self.query_live(job_id, GET_PROGRESS_QUERY).await?;

        Ok(match snapshot {
            Some(snapshot) => ReportedStage::Live(snapshot.stage),
            None if status == ExecutionStatus::Running => ReportedStage::WorkerUnreachable,
            None => ReportedStage::Unknown,
        })
    }

    /// Attempt of the in-flight activity: last heartbeat first, engine counter
    /// until the attempt has reported.
    ///
    /// With no pending activity (the activity may have closed after `describe`)
    /// the description's attempt bookkeeping is used, so the attempt does not
    /// drop back to 0 while the execution still reads as running.
    async fn in_flight_attempt(
        &self,
        job_id: &JobId,
        description: &ExecutionDescription,
    ) -> Result<u32> {
        let pending = self
            .best_effort("pending_activities", self.engine.pending_activities(job_id))
            .await?;

        let in_flight = pending
            .and_then(|activities| activities.into_iter().next())
            .map(|activity| {
                decode_attempt(&activity.heartbeat_details).unwrap_or(activity.attempt)
            });

        Ok(in_flight.or(description.activity_attempts).unwrap_or(0))
    }

    async fn terminal_output(&self, job_id: &JobId) -> Result<JobOutput> {
        let value = self.call(self.engine.result(job_id)).await?;

        WorkflowOutput::decode(value)
            .map(WorkflowOutput::into_current)
            .map_err(|e| JobError::Internal(format!("undecodable workflow output: {}", e)))
    }

    /// Attempts made by a failed job: engine bookkeeping, then the instance's
    /// configured maximum, then a fixed fallback.
    async fn failed_attempts(
        &self,
        job_id: &JobId,
        description: &ExecutionDescription,
    ) -> Result<u32> {
        if let Some(attempts) = description.activity_attempts {
            return Ok(attempts);
        }

        let config: Option<JobConfig> = self.query_live(job_id, GET_JOB_CONFIG_QUERY).await?;
        Ok(config
            .map(|config| config.max_attempts)
            .unwrap_or(FALLBACK_FAILED_ATTEMPTS))
    }
}
