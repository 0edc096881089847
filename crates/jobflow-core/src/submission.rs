// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job submission.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::engine::OrchestrationService;
use crate::error::{EngineError, JobError, Result};
use crate::types::{ComputeParams, JobId};

/// Starts job workflow instances on the engine.
#[derive(Clone)]
pub struct JobSubmitter {
    engine: Arc<dyn OrchestrationService>,
}

impl JobSubmitter {
    /// Create a submitter over the given engine client.
    pub fn new(engine: Arc<dyn OrchestrationService>) -> Self {
        Self { engine }
    }

    /// Validate `params`, start a new workflow instance and return its id.
    ///
    /// Returns as soon as the engine has accepted the start request; the job
    /// runs asynchronously. Invalid input fails before the engine is touched.
    #[instrument(skip(self, params), fields(numbers = params.numbers.len()))]
    pub async fn submit(&self, params: ComputeParams) -> Result<JobId> {
        params.validate()?;

        let job_id = JobId::generate();
        self.engine
            .start_workflow(&job_id, &params)
            .await
            .map_err(|e| match e {
                EngineError::AlreadyStarted(id) => {
                    JobError::Internal(format!("generated job id collided: {}", id))
                }
                other => other.into(),
            })?;

        info!(
            job_id = %job_id,
            fail_first_attempt = params.fail_first_attempt,
            "Job submitted"
        );
        Ok(job_id)
    }
}
