// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Gateway-facing facade over submission and status reconciliation.

use std::sync::Arc;

use crate::config::ReconcilerConfig;
use crate::engine::OrchestrationService;
use crate::error::Result;
use crate::reconciler::StatusReconciler;
use crate::submission::JobSubmitter;
use crate::types::{ComputeParams, JobId, JobStatus};

/// Submit jobs and read their status through one engine client.
#[derive(Clone)]
pub struct JobService {
    engine: Arc<dyn OrchestrationService>,
    submitter: JobSubmitter,
    reconciler: StatusReconciler,
}

impl JobService {
    /// Create a service over an already connected engine client.
    pub fn new(engine: Arc<dyn OrchestrationService>, config: &ReconcilerConfig) -> Self {
        Self {
            submitter: JobSubmitter::new(Arc::clone(&engine)),
            reconciler: StatusReconciler::new(Arc::clone(&engine), config),
            engine,
        }
    }

    /// Start a job and return its id.
    pub async fn submit(&self, params: ComputeParams) -> Result<JobId> {
        self.submitter.submit(params).await
    }

    /// Reconciled status of a job.
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.reconciler.reconcile(job_id).await
    }

    /// Whether the engine client is connected.
    pub async fn is_ready(&self) -> bool {
        self.engine.is_connected().await
    }

    /// The engine client shared by submission and reconciliation.
    pub fn engine(&self) -> &Arc<dyn OrchestrationService> {
        &self.engine
    }
}
