// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded orchestration engine.
//!
//! Runs workflow instances as tokio tasks inside the current process and
//! keeps execution records in memory. It enforces the activity retry policy
//! and start-to-close timeout, records heartbeats and answers queries, which
//! makes it a faithful stand-in for a remote engine in tests and
//! single-process deployments. Nothing survives a process restart.
//!
//! Closed executions are kept until dropped by the retention window set with
//! [`EmbeddedEngine::with_retention`]; without one they are kept for the
//! lifetime of the engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::{ExecutionDescription, OrchestrationService, PendingActivity};
use crate::activity::{Activity, ActivityContext, ActivityInfo, HeartbeatSink, SumNumbersActivity};
use crate::config::WorkerConfig;
use crate::error::{ActivityFailure, EngineError, EngineResult, Result, TaskError};
use crate::retry::ActivityOptions;
use crate::types::{ComputeParams, ExecutionStatus, JobId, JobOutput, WorkflowOutput};
use crate::workflow::{JobQueries, JobWorkflow, WorkflowContext};

/// Terminal outcome of an instance.
#[derive(Debug, Clone)]
enum Outcome {
    Completed(Value),
    Failed(String),
}

struct InstanceRecord {
    status: ExecutionStatus,
    started_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    queries: JobQueries,
    pending: Option<PendingActivity>,
    attempts_made: u32,
    outcome: watch::Sender<Option<Outcome>>,
}

struct EngineInner {
    activity: Arc<dyn Activity>,
    options: ActivityOptions,
    connected: AtomicBool,
    worker_available: AtomicBool,
    instances: RwLock<HashMap<JobId, InstanceRecord>>,
}

impl EngineInner {
    fn ensure_connected(&self) -> EngineResult<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(EngineError::Unavailable(
                "embedded engine is not connected".to_string(),
            ))
        }
    }

    fn read<R>(&self, job_id: &JobId, f: impl FnOnce(&InstanceRecord) -> R) -> EngineResult<R> {
        let instances = self
            .instances
            .read()
            .map_err(|_| EngineError::Unavailable("engine state lock poisoned".to_string()))?;
        instances
            .get(job_id)
            .map(f)
            .ok_or_else(|| EngineError::NotFound(job_id.to_string()))
    }

    fn update(&self, job_id: &JobId, f: impl FnOnce(&mut InstanceRecord)) {
        match self.instances.write() {
            Ok(mut instances) => match instances.get_mut(job_id) {
                Some(record) => f(record),
                None => warn!(job_id = %job_id, "Update for unknown instance ignored"),
            },
            Err(_) => warn!(job_id = %job_id, "Engine state lock poisoned, update dropped"),
        }
    }

    fn begin_attempt(&self, job_id: &JobId, attempt: u32, activity_type: &str) {
        self.update(job_id, |record| {
            record.attempts_made = attempt;
            match record.pending.as_mut() {
                // Heartbeat details survive into the next attempt until it reports.
                Some(pending) => pending.attempt = attempt,
                None => {
                    record.pending = Some(PendingActivity {
                        activity_id: "1".to_string(),
                        activity_type: activity_type.to_string(),
                        attempt,
                        heartbeat_details: Vec::new(),
                        last_heartbeat_at: None,
                        last_failure: None,
                    })
                }
            }
        });
    }

    fn record_failure(&self, job_id: &JobId, cause: &TaskError) {
        self.update(job_id, |record| {
            if let Some(pending) = record.pending.as_mut() {
                pending.last_failure = Some(cause.to_string());
            }
        });
    }

    fn end_activity(&self, job_id: &JobId) {
        self.update(job_id, |record| record.pending = None);
    }

    fn remove(&self, job_id: &JobId) {
        match self.instances.write() {
            Ok(mut instances) => {
                if instances.remove(job_id).is_some() {
                    debug!(job_id = %job_id, "Closed execution dropped after retention");
                }
            }
            Err(_) => warn!(job_id = %job_id, "Engine state lock poisoned, record kept"),
        }
    }

    fn finish(&self, job_id: &JobId, outcome: Outcome) {
        self.update(job_id, |record| {
            record.status = match outcome {
                Outcome::Completed(_) => ExecutionStatus::Completed,
                Outcome::Failed(_) => ExecutionStatus::Failed,
            };
            record.closed_at = Some(Utc::now());
            record.pending = None;
            record.outcome.send_replace(Some(outcome));
        });
    }
}

/// Heartbeat sink bound to one attempt of one instance.
struct AttemptHeartbeats {
    inner: Arc<EngineInner>,
    job_id: JobId,
    attempt: u32,
}

impl HeartbeatSink for AttemptHeartbeats {
    fn record(&self, details: Vec<Value>) {
        let attempt = self.attempt;
        self.inner.update(&self.job_id, |record| match record.pending.as_mut() {
            Some(pending) if pending.attempt == attempt => {
                pending.heartbeat_details = details;
                pending.last_heartbeat_at = Some(Utc::now());
            }
            _ => debug!(attempt, "Dropping heartbeat from superseded attempt"),
        });
    }
}

/// Workflow context that schedules activities on the embedded engine.
struct EngineWorkflowContext {
    inner: Arc<EngineInner>,
    job_id: JobId,
}

#[async_trait]
impl WorkflowContext for EngineWorkflowContext {
    fn job_id(&self) -> &JobId {
        &self.job_id
    }

    async fn execute_activity(
        &self,
        params: &ComputeParams,
        options: &ActivityOptions,
    ) -> std::result::Result<JobOutput, ActivityFailure> {
        let policy = options.retry_policy();
        let timeout = options.start_to_close_timeout();
        let activity_type = self.inner.activity.name().to_string();
        let mut attempt = 1;

        loop {
            self.inner.begin_attempt(&self.job_id, attempt, &activity_type);

            let ctx = ActivityContext::new(
                ActivityInfo {
                    job_id: self.job_id.clone(),
                    activity_type: activity_type.clone(),
                    attempt,
                },
                Arc::new(AttemptHeartbeats {
                    inner: Arc::clone(&self.inner),
                    job_id: self.job_id.clone(),
                    attempt,
                }),
            );

            let outcome =
                match tokio::time::timeout(timeout, self.inner.activity.execute(&ctx, params))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => Err(TaskError::Timeout {
                        attempt,
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };

            let cause = match outcome {
                Ok(output) => {
                    self.inner.end_activity(&self.job_id);
                    return Ok(output);
                }
                Err(cause) => cause,
            };

            self.inner.record_failure(&self.job_id, &cause);

            if !cause.is_retryable() || !policy.allows_retry_after(attempt) {
                self.inner.end_activity(&self.job_id);
                return Err(ActivityFailure {
                    activity: activity_type,
                    attempts: attempt,
                    cause,
                });
            }

            let delay = policy.delay_after(attempt);
            warn!(
                job_id = %self.job_id,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %cause,
                "Activity attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn run_instance(
    inner: Arc<EngineInner>,
    workflow: JobWorkflow,
    job_id: JobId,
    input: Value,
    retention: Option<Duration>,
) {
    let outcome = match serde_json::from_value::<ComputeParams>(input) {
        Ok(params) => {
            let ctx = EngineWorkflowContext {
                inner: Arc::clone(&inner),
                job_id: job_id.clone(),
            };
            match workflow.run(&ctx, params).await {
                Ok(output) => match serde_json::to_value(WorkflowOutput::from(output)) {
                    Ok(value) => Outcome::Completed(value),
                    Err(e) => Outcome::Failed(format!("failed to encode workflow output: {}", e)),
                },
                Err(failure) => Outcome::Failed(failure.to_string()),
            }
        }
        Err(e) => Outcome::Failed(format!("invalid workflow input: {}", e)),
    };

    inner.finish(&job_id, outcome);

    if let Some(retention) = retention {
        tokio::time::sleep(retention).await;
        inner.remove(&job_id);
    }
}

/// In-process orchestration engine hosting the job workflow and one activity.
#[derive(Clone)]
pub struct EmbeddedEngine {
    inner: Arc<EngineInner>,
    retention: Option<Duration>,
}

impl EmbeddedEngine {
    /// Create an engine running `activity` with the given options.
    ///
    /// The engine starts disconnected; call
    /// [`connect`](OrchestrationService::connect) before use.
    pub fn new(activity: Arc<dyn Activity>, options: ActivityOptions) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                activity,
                options,
                connected: AtomicBool::new(false),
                worker_available: AtomicBool::new(true),
                instances: RwLock::new(HashMap::new()),
            }),
            retention: None,
        }
    }

    /// Drop each execution's record `retention` after it closes.
    ///
    /// Once dropped, the execution is unknown to the engine and reads as
    /// `NotFound`.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Create an engine running the summing activity as configured.
    pub fn from_config(config: &WorkerConfig) -> Result<Self> {
        let activity = SumNumbersActivity::new().with_work_duration(config.work_duration);
        let engine = Self::new(Arc::new(activity), config.activity_options()?);
        Ok(match config.retention {
            Some(retention) => engine.with_retention(retention),
            None => engine,
        })
    }

    /// Mark the worker's query endpoint as reachable or not.
    ///
    /// Executions keep running either way; only queries are affected.
    pub fn set_worker_available(&self, available: bool) {
        self.inner
            .worker_available
            .store(available, Ordering::Release);
        info!(available, "Worker availability changed");
    }

    /// Whether the worker's query endpoint is reachable.
    pub fn worker_available(&self) -> bool {
        self.inner.worker_available.load(Ordering::Acquire)
    }

    /// Number of executions currently recorded by this engine.
    pub fn instance_count(&self) -> usize {
        self.inner
            .instances
            .read()
            .map(|instances| instances.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl OrchestrationService for EmbeddedEngine {
    async fn connect(&self) -> EngineResult<()> {
        self.inner.connected.store(true, Ordering::Release);
        debug!("Embedded engine connected");
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    async fn close(&self) {
        self.inner.connected.store(false, Ordering::Release);
        debug!("Embedded engine closed");
    }

    #[instrument(skip(self, params), fields(job_id = %job_id))]
    async fn start_workflow(&self, job_id: &JobId, params: &ComputeParams) -> EngineResult<()> {
        self.inner.ensure_connected()?;

        let input = serde_json::to_value(params)?;
        let workflow = JobWorkflow::new(self.inner.options.clone());
        let (outcome, _) = watch::channel(None);

        {
            let mut instances = self
                .inner
                .instances
                .write()
                .map_err(|_| EngineError::Unavailable("engine state lock poisoned".to_string()))?;

            if instances.contains_key(job_id) {
                return Err(EngineError::AlreadyStarted(job_id.to_string()));
            }

            instances.insert(
                job_id.clone(),
                InstanceRecord {
                    status: ExecutionStatus::Running,
                    started_at: Utc::now(),
                    closed_at: None,
                    queries: workflow.queries(),
                    pending: None,
                    attempts_made: 0,
                    outcome,
                },
            );
        }

        tokio::spawn(run_instance(
            Arc::clone(&self.inner),
            workflow,
            job_id.clone(),
            input,
            self.retention,
        ));

        info!("Workflow started");
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn describe(&self, job_id: &JobId) -> EngineResult<ExecutionDescription> {
        self.inner.ensure_connected()?;

        self.inner.read(job_id, |record| ExecutionDescription {
            job_id: job_id.clone(),
            status: record.status,
            started_at: record.started_at,
            closed_at: record.closed_at,
            activity_attempts: (record.attempts_made > 0).then_some(record.attempts_made),
        })
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn query(&self, job_id: &JobId, query: &str) -> EngineResult<Value> {
        self.inner.ensure_connected()?;

        let queries = self.inner.read(job_id, |record| record.queries.clone())?;

        if !self.worker_available() {
            return Err(EngineError::WorkerUnreachable {
                job_id: job_id.to_string(),
                reason: "no worker is polling the task queue".to_string(),
            });
        }

        queries.handle(query)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn result(&self, job_id: &JobId) -> EngineResult<Value> {
        self.inner.ensure_connected()?;

        let mut outcome = self.inner.read(job_id, |record| record.outcome.subscribe())?;

        let outcome = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| EngineError::Unavailable("engine shut down".to_string()))?
            .clone();

        match outcome {
            Some(Outcome::Completed(value)) => Ok(value),
            Some(Outcome::Failed(message)) => Err(EngineError::WorkflowFailed(message)),
            None => Err(EngineError::Unavailable(
                "execution closed without an outcome".to_string(),
            )),
        }
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn pending_activities(&self, job_id: &JobId) -> EngineResult<Vec<PendingActivity>> {
        self.inner.ensure_connected()?;

        self.inner
            .read(job_id, |record| record.pending.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::retry::RetryPolicy;
    use crate::workflow::GET_PROGRESS_QUERY;

    async fn connected_engine() -> EmbeddedEngine {
        let engine = EmbeddedEngine::new(
            Arc::new(SumNumbersActivity::new()),
            ActivityOptions::new(RetryPolicy::fixed(3, Duration::from_millis(5)).unwrap()),
        );
        engine.connect().await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let engine = EmbeddedEngine::new(
            Arc::new(SumNumbersActivity::new()),
            ActivityOptions::default(),
        );
        let err = engine
            .start_workflow(&JobId::from("job-1"), &ComputeParams::new(vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable(_)));
        assert_eq!(engine.instance_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_start_is_rejected() {
        let engine = connected_engine().await;
        let job_id = JobId::from("job-dup");
        let params = ComputeParams::new(vec![1]);

        engine.start_workflow(&job_id, &params).await.unwrap();
        let err = engine.start_workflow(&job_id, &params).await.unwrap_err();

        assert!(matches!(err, EngineError::AlreadyStarted(_)));
        assert_eq!(engine.instance_count(), 1);
    }

    #[tokio::test]
    async fn test_result_and_describe_after_completion() {
        let engine = connected_engine().await;
        let job_id = JobId::from("job-sum");

        engine
            .start_workflow(&job_id, &ComputeParams::new(vec![2, 3]))
            .await
            .unwrap();

        let value = engine.result(&job_id).await.unwrap();
        assert_eq!(value, serde_json::json!({"result": 5, "attempt": 1}));

        let description = engine.describe(&job_id).await.unwrap();
        assert_eq!(description.status, ExecutionStatus::Completed);
        assert!(description.closed_at.is_some());
        assert_eq!(description.activity_attempts, Some(1));
        assert!(engine.pending_activities(&job_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_execution() {
        let engine = connected_engine().await;
        let job_id = JobId::from("job-missing");

        assert!(matches!(
            engine.describe(&job_id).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            engine.query(&job_id, GET_PROGRESS_QUERY).await,
            Err(EngineError::NotFound(_))
        ));
        assert!(matches!(
            engine.pending_activities(&job_id).await,
            Err(EngineError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_query_fails_when_worker_unavailable() {
        let engine = connected_engine().await;
        let job_id = JobId::from("job-q");
        engine
            .start_workflow(&job_id, &ComputeParams::new(vec![1]))
            .await
            .unwrap();

        engine.set_worker_available(false);
        assert!(matches!(
            engine.query(&job_id, GET_PROGRESS_QUERY).await,
            Err(EngineError::WorkerUnreachable { .. })
        ));

        engine.set_worker_available(true);
        assert!(engine.query(&job_id, GET_PROGRESS_QUERY).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_executions_dropped_after_retention() {
        let engine = connected_engine()
            .await
            .with_retention(Duration::from_secs(60));
        let job_id = JobId::from("job-retained");

        engine
            .start_workflow(&job_id, &ComputeParams::new(vec![1, 2]))
            .await
            .unwrap();
        engine.result(&job_id).await.unwrap();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            engine.describe(&job_id).await.unwrap().status,
            ExecutionStatus::Completed
        );

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(matches!(
            engine.describe(&job_id).await,
            Err(EngineError::NotFound(_))
        ));
        assert_eq!(engine.instance_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_execution_is_not_dropped() {
        let engine = EmbeddedEngine::new(
            Arc::new(SumNumbersActivity::new().with_work_duration(Duration::from_secs(120))),
            ActivityOptions::default(),
        )
        .with_retention(Duration::from_secs(1));
        engine.connect().await.unwrap();
        let job_id = JobId::from("job-long");

        engine
            .start_workflow(&job_id, &ComputeParams::new(vec![1]))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            engine.describe(&job_id).await.unwrap().status,
            ExecutionStatus::Running
        );
    }

    #[tokio::test]
    async fn test_non_retryable_failure_stops_early() {
        let engine = connected_engine().await;
        let job_id = JobId::from("job-overflow");
        engine
            .start_workflow(&job_id, &ComputeParams::new(vec![i64::MAX, 1]))
            .await
            .unwrap();

        let err = engine.result(&job_id).await.unwrap_err();
        assert!(matches!(err, EngineError::WorkflowFailed(msg) if msg.contains("1 attempt(s)")));

        let description = engine.describe(&job_id).await.unwrap();
        assert_eq!(description.status, ExecutionStatus::Failed);
        assert_eq!(description.activity_attempts, Some(1));
    }
}
