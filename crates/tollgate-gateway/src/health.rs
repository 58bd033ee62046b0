//! Liveness and version reporting for `/_tollgate/*`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Gateway health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting traffic.
    Healthy,
    /// Shutting down.
    Draining,
}

/// Body of `GET /_tollgate/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service name from config.
    pub service: String,
    /// Seconds since startup.
    pub uptime_seconds: u64,
    /// Number of configured backend routes.
    pub routes: usize,
}

/// Body of `GET /_tollgate/version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    /// Service name from config.
    pub service: String,
    /// Crate version.
    pub version: String,
}

/// Tracks startup time and drain state.
#[derive(Debug)]
pub struct HealthChecker {
    service: String,
    routes: usize,
    start_time: Instant,
    draining: AtomicBool,
}

impl HealthChecker {
    /// Create a checker.
    pub fn new(service: impl Into<String>, routes: usize) -> Self {
        Self {
            service: service.into(),
            routes,
            start_time: Instant::now(),
            draining: AtomicBool::new(false),
        }
    }

    /// Mark the gateway as shutting down.
    pub fn set_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    /// Current status.
    pub fn status(&self) -> HealthStatus {
        if self.draining.load(Ordering::SeqCst) {
            HealthStatus::Draining
        } else {
            HealthStatus::Healthy
        }
    }

    /// Health report.
    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            status: self.status(),
            service: self.service.clone(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            routes: self.routes,
        }
    }

    /// Version report.
    pub fn version(&self) -> VersionResponse {
        VersionResponse {
            service: self.service.clone(),
            version: crate::VERSION.to_string(),
        }
    }
}
