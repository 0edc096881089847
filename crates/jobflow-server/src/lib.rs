// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Jobflow server - HTTP gateway over the job core.
//!
//! Routes:
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | `POST` | `/jobs` | `{"job_id": ...}` |
//! | `GET` | `/jobs/{job_id}` | reconciled job status |
//! | `GET` | `/health` | `{"status": "ok"}` |
//!
//! Errors are returned as `{"error": <code>, "message": <text>}` with
//! 400 (invalid input), 404 (unknown job) or 503 (engine unavailable).

pub mod api;
pub mod config;
pub mod error;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use jobflow_core::JobService;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::{ApiError, Result, ServerError};

/// Build the gateway router.
pub fn router(service: Arc<JobService>) -> Router {
    Router::new()
        .route("/jobs", post(api::submit_job))
        .route("/jobs/{job_id}", get(api::job_status))
        .route("/health", get(api::health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
