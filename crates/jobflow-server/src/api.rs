// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request/response DTOs and handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use jobflow_core::{ComputeParams, JobId, JobService, JobStatus};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ApiError;

/// Numbers to sum.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInput {
    /// Values to add up; must not be empty.
    pub numbers: Vec<i64>,
}

/// Per-job flags.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobOptions {
    /// Fail the first activity attempt on purpose.
    #[serde(default)]
    pub fail_first_attempt: bool,
}

/// `POST /jobs` body.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRequest {
    pub input: JobInput,
    #[serde(default)]
    pub options: JobOptions,
}

impl From<JobRequest> for ComputeParams {
    fn from(request: JobRequest) -> Self {
        ComputeParams::new(request.input.numbers)
            .with_fail_first_attempt(request.options.fail_first_attempt)
    }
}

/// `POST /jobs` response.
#[derive(Debug, Clone, Serialize)]
pub struct JobCreated {
    pub job_id: JobId,
}

pub async fn submit_job(
    State(service): State<Arc<JobService>>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Json<JobCreated>, ApiError> {
    let Json(request) = payload?;
    let job_id = service.submit(request.into()).await?;
    Ok(Json(JobCreated { job_id }))
}

pub async fn job_status(
    State(service): State<Arc<JobService>>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatus>, ApiError> {
    let status = service.status(&JobId::from(job_id)).await?;
    Ok(Json(status))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_without_options() {
        let request: JobRequest = serde_json::from_value(json!({
            "input": {"numbers": [1, 2, 3]}
        }))
        .unwrap();

        let params = ComputeParams::from(request);
        assert_eq!(params.numbers, vec![1, 2, 3]);
        assert!(!params.fail_first_attempt);
    }

    #[test]
    fn test_request_with_options() {
        let request: JobRequest = serde_json::from_value(json!({
            "input": {"numbers": [4]},
            "options": {"fail_first_attempt": true}
        }))
        .unwrap();

        assert!(ComputeParams::from(request).fail_first_attempt);
    }
}
