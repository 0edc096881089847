// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use jobflow_core::{ReconcilerConfig, WorkerConfig};

use crate::error::{Result, ServerError};

/// Simulated work per attempt when `JOBFLOW_WORK_DURATION_MS` is unset, long
/// enough for clients to observe the `computing` stage.
pub const DEFAULT_WORK_DURATION: Duration = Duration::from_secs(15);

/// Retention of closed jobs when `JOBFLOW_RETENTION_MS` is unset.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

/// Default gateway bind address.
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8000";

/// Configuration of the gateway and its embedded worker.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP gateway binds to.
    pub http_addr: SocketAddr,
    /// Worker settings.
    pub worker: WorkerConfig,
    /// Status reconciler settings.
    pub reconciler: ReconcilerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `JOBFLOW_HTTP_ADDR` (default: 127.0.0.1:8000)
    /// - `JOBFLOW_WORK_DURATION_MS` (default: 15000)
    /// - `JOBFLOW_RETENTION_MS` (default: 3600000; 0 keeps closed jobs forever)
    /// - everything read by [`WorkerConfig::from_env`] and
    ///   [`ReconcilerConfig::from_env`]
    pub fn from_env() -> Result<Self> {
        let http_addr = std::env::var("JOBFLOW_HTTP_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string())
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid JOBFLOW_HTTP_ADDR: {}", e)))?;

        let mut worker = WorkerConfig::from_env()?;
        if std::env::var_os("JOBFLOW_WORK_DURATION_MS").is_none() {
            worker = worker.with_work_duration(DEFAULT_WORK_DURATION);
        }
        if std::env::var_os("JOBFLOW_RETENTION_MS").is_none() {
            worker = worker.with_retention(DEFAULT_RETENTION);
        }

        Ok(Self {
            http_addr,
            worker,
            reconciler: ReconcilerConfig::from_env()?,
        })
    }

    /// Set the bind address.
    pub fn with_http_addr(mut self, addr: SocketAddr) -> Self {
        self.http_addr = addr;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            worker: WorkerConfig::default()
                .with_work_duration(DEFAULT_WORK_DURATION)
                .with_retention(DEFAULT_RETENTION),
            reconciler: ReconcilerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR.parse().unwrap());
        assert_eq!(config.worker.work_duration, Duration::from_secs(15));
        assert_eq!(config.worker.max_attempts, 5);
        assert_eq!(config.worker.retention, Some(Duration::from_secs(3600)));
        assert_eq!(config.reconciler.rpc_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_with_http_addr() {
        let config = ServerConfig::default().with_http_addr("0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.http_addr.port(), 9000);
    }
}
