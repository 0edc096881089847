// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The job workflow state machine.
//!
//! A [`JobWorkflow`] instance owns the job's [`Stage`] and drives the task
//! function through exactly one durable activity call. The call to
//! [`WorkflowContext::execute_activity`] is the only suspension point of
//! [`JobWorkflow::run`]; everything before and after it is synchronous so the
//! engine can replay the instance deterministically.
//!
//! Stage transitions:
//!
//! ```text
//! pending ──run──▶ computing ──ok──▶ completed
//!                      │
//!                      └──retries exhausted──▶ failed
//! ```
//!
//! Queries (`get_job_config`, `get_progress`) are served by a [`JobQueries`]
//! handle that reads the stage through a watch channel, so they can be
//! answered while `run` is suspended.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{ActivityFailure, EngineError};
use crate::retry::ActivityOptions;
use crate::types::{ComputeParams, JobConfig, JobId, JobOutput, ProgressSnapshot, Stage};

/// Query name returning [`JobConfig`].
pub const GET_JOB_CONFIG_QUERY: &str = "get_job_config";

/// Query name returning [`ProgressSnapshot`].
pub const GET_PROGRESS_QUERY: &str = "get_progress";

/// Engine services available to a running workflow.
#[async_trait]
pub trait WorkflowContext: Send + Sync {
    /// Id of the running instance.
    fn job_id(&self) -> &JobId;

    /// Schedule the activity and wait for its final outcome.
    ///
    /// Retries are handled by the engine according to the options' retry
    /// policy; only success or exhaustion is returned.
    async fn execute_activity(
        &self,
        params: &ComputeParams,
        options: &ActivityOptions,
    ) -> Result<JobOutput, ActivityFailure>;
}

/// One instance of the job state machine.
pub struct JobWorkflow {
    stage: watch::Sender<Stage>,
    options: ActivityOptions,
}

impl JobWorkflow {
    /// Create an instance in the `pending` stage.
    pub fn new(options: ActivityOptions) -> Self {
        let (stage, _) = watch::channel(Stage::Pending);
        Self { stage, options }
    }

    /// Query handle for this instance.
    pub fn queries(&self) -> JobQueries {
        JobQueries {
            stage: self.stage.subscribe(),
            max_attempts: self.options.retry_policy().max_attempts(),
        }
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        *self.stage.borrow()
    }

    /// Drive the job to a terminal stage.
    pub async fn run(
        &self,
        ctx: &dyn WorkflowContext,
        params: ComputeParams,
    ) -> Result<JobOutput, ActivityFailure> {
        self.stage.send_replace(Stage::Computing);
        info!(
            job_id = %ctx.job_id(),
            max_attempts = self.options.retry_policy().max_attempts(),
            "Job computing"
        );

        match ctx.execute_activity(&params, &self.options).await {
            Ok(output) => {
                self.stage.send_replace(Stage::Completed);
                info!(
                    job_id = %ctx.job_id(),
                    result = output.result,
                    attempt = output.attempt,
                    "Job completed"
                );
                Ok(output)
            }
            Err(failure) => {
                self.stage.send_replace(Stage::Failed);
                warn!(job_id = %ctx.job_id(), error = %failure, "Job failed");
                Err(failure)
            }
        }
    }
}

/// Read-only query side of a [`JobWorkflow`].
#[derive(Debug, Clone)]
pub struct JobQueries {
    stage: watch::Receiver<Stage>,
    max_attempts: u32,
}

impl JobQueries {
    /// `get_job_config` query.
    pub fn get_job_config(&self) -> JobConfig {
        JobConfig {
            max_attempts: self.max_attempts,
        }
    }

    /// `get_progress` query.
    pub fn get_progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            stage: *self.stage.borrow(),
        }
    }

    /// Answer a query by name with a JSON payload.
    pub fn handle(&self, query: &str) -> Result<Value, EngineError> {
        let response = match query {
            GET_JOB_CONFIG_QUERY => serde_json::to_value(self.get_job_config())?,
            GET_PROGRESS_QUERY => serde_json::to_value(self.get_progress())?,
            other => {
                return Err(EngineError::QueryRejected {
                    query: other.to_string(),
                    reason: "unknown query".to_string(),
                });
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use tokio::sync::oneshot;

    use super::*;
    use crate::error::TaskError;
    use crate::retry::RetryPolicy;

    struct ScriptedContext {
        job_id: JobId,
        outcome: Result<JobOutput, ActivityFailure>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl WorkflowContext for ScriptedContext {
        fn job_id(&self) -> &JobId {
            &self.job_id
        }

        async fn execute_activity(
            &self,
            _params: &ComputeParams,
            _options: &ActivityOptions,
        ) -> Result<JobOutput, ActivityFailure> {
            *self.calls.lock().unwrap() += 1;
            self.outcome.clone()
        }
    }

    fn workflow() -> JobWorkflow {
        JobWorkflow::new(ActivityOptions::new(
            RetryPolicy::fixed(4, std::time::Duration::from_millis(1)).unwrap(),
        ))
    }

    #[tokio::test]
    async fn test_run_success_transitions_to_completed() {
        let wf = workflow();
        let queries = wf.queries();
        assert_eq!(queries.get_progress().stage, Stage::Pending);

        let ctx = ScriptedContext {
            job_id: JobId::from("job-ok"),
            outcome: Ok(JobOutput { result: 6, attempt: 1 }),
            calls: Mutex::new(0),
        };
        let output = wf.run(&ctx, ComputeParams::new(vec![1, 2, 3])).await.unwrap();

        assert_eq!(output, JobOutput { result: 6, attempt: 1 });
        assert_eq!(wf.stage(), Stage::Completed);
        assert_eq!(queries.get_progress().stage, Stage::Completed);
        assert_eq!(*ctx.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_run_failure_transitions_to_failed_and_propagates() {
        let wf = workflow();
        let failure = ActivityFailure {
            activity: "sum_numbers".to_string(),
            attempts: 4,
            cause: TaskError::SimulatedFailure { attempt: 4 },
        };
        let ctx = ScriptedContext {
            job_id: JobId::from("job-fail"),
            outcome: Err(failure.clone()),
            calls: Mutex::new(0),
        };

        let result = wf.run(&ctx, ComputeParams::new(vec![1])).await;

        assert_eq!(result, Err(failure));
        assert_eq!(wf.stage(), Stage::Failed);
        assert_eq!(*ctx.calls.lock().unwrap(), 1);
    }

    struct BlockingContext {
        job_id: JobId,
        release: Mutex<Option<oneshot::Receiver<()>>>,
    }

    #[async_trait]
    impl WorkflowContext for BlockingContext {
        fn job_id(&self) -> &JobId {
            &self.job_id
        }

        async fn execute_activity(
            &self,
            _params: &ComputeParams,
            _options: &ActivityOptions,
        ) -> Result<JobOutput, ActivityFailure> {
            let release = self.release.lock().unwrap().take();
            if let Some(rx) = release {
                let _ = rx.await;
            }
            Ok(JobOutput { result: 1, attempt: 1 })
        }
    }

    #[tokio::test]
    async fn test_queries_answer_while_suspended() {
        let wf = std::sync::Arc::new(workflow());
        let queries = wf.queries();
        let (tx, rx) = oneshot::channel();
        let ctx = BlockingContext {
            job_id: JobId::from("job-block"),
            release: Mutex::new(Some(rx)),
        };

        let runner = {
            let wf = wf.clone();
            tokio::spawn(async move { wf.run(&ctx, ComputeParams::new(vec![1])).await })
        };

        let mut stage = queries.stage.clone();
        stage
            .wait_for(|s| *s == Stage::Computing)
            .await
            .unwrap();
        assert_eq!(queries.get_progress().stage, Stage::Computing);
        assert_eq!(queries.get_job_config().max_attempts, 4);

        tx.send(()).unwrap();
        runner.await.unwrap().unwrap();
        assert_eq!(queries.get_progress().stage, Stage::Completed);
    }

    #[test]
    fn test_query_dispatch_by_name() {
        let queries = workflow().queries();
        assert_eq!(
            queries.handle(GET_JOB_CONFIG_QUERY).unwrap(),
            json!({"max_attempts": 4})
        );
        assert_eq!(
            queries.handle(GET_PROGRESS_QUERY).unwrap(),
            json!({"stage": "pending"})
        );
        assert!(matches!(
            queries.handle("get_everything"),
            Err(EngineError::QueryRejected { .. })
        ));
    }
}
