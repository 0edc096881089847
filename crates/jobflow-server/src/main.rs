// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Jobflow Server
//!
//! Runs the HTTP gateway and the job worker in one process on top of the
//! embedded orchestration engine.

use std::sync::Arc;

use anyhow::Result;
use jobflow_core::{EmbeddedEngine, JobService, OrchestrationService};
use jobflow_server::{ServerConfig, ServerError, router};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("jobflow_core=info".parse()?)
                .add_directive("jobflow_server=info".parse()?),
        )
        .init();

    info!("Starting Jobflow Server");

    let config = ServerConfig::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        max_attempts = config.worker.max_attempts,
        work_duration_ms = config.worker.work_duration.as_millis() as u64,
        retention = ?config.worker.retention,
        rpc_timeout_ms = config.reconciler.rpc_timeout.as_millis() as u64,
        "Configuration loaded"
    );

    let engine = Arc::new(EmbeddedEngine::from_config(&config.worker)?);
    engine.connect().await?;
    info!("Orchestration engine connected");

    let service = Arc::new(JobService::new(engine.clone(), &config.reconciler));

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.http_addr,
            source,
        })?;
    info!(addr = %config.http_addr, "HTTP gateway listening");

    axum::serve(listener, router(service))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Shutting down...");
    engine.close().await;
    info!("Shutdown complete");

    Ok(())
}
