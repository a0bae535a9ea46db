//! Health check functionality
//!
//! This module provides health check functionality for the role-queue
//! matchmaking service, including readiness and liveness probes.

use crate::scheduler::SchedulerStats;
use crate::service::http::ApiState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Value exported through the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Unhealthy => 0,
            HealthStatus::Degraded => 1,
            HealthStatus::Healthy => 2,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Crate version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if unhealthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Participants currently waiting
    pub players_waiting: usize,
    /// Matches stored since service start
    pub matches_created: usize,
    /// Scheduler counters
    pub scheduler: SchedulerStats,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(state: &ApiState) -> Result<Self> {
        let mut checks = vec![Self::check_service_running(state).await];
        checks.push(Self::check_waiting_pool(state));
        checks.push(Self::check_match_store(state));

        let status = checks
            .iter()
            .fold(HealthStatus::Healthy, |acc, check| acc.worst(check.status));

        state.metrics_collector.update_health_status(status.as_gauge());
        for check in &checks {
            state
                .metrics_collector
                .update_component_health(&check.name, check.status != HealthStatus::Unhealthy);
        }

        Ok(HealthCheck {
            status,
            service: state.service_name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats: Self::gather_service_stats(state),
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(state: &ApiState) -> HealthStatus {
        if state.is_running().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        }
    }

    /// Readiness check - verify service can handle requests
    pub async fn readiness_check(state: &ApiState) -> HealthStatus {
        if !state.is_running().await {
            return HealthStatus::Unhealthy;
        }
        Self::check_waiting_pool(state).status
    }

    async fn check_service_running(state: &ApiState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_waiting_pool(state: &ApiState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match state.scheduler.queue_size() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Waiting pool health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "waiting_pool".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_match_store(state: &ApiState) -> ComponentCheck {
        let start = std::time::Instant::now();

        // A broken store only blocks commits, queueing still works
        let (status, message) = match state.scheduler.match_count() {
            Ok(_) => (HealthStatus::Healthy, None),
            Err(e) => {
                error!("Match store health check failed: {}", e);
                (HealthStatus::Degraded, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "match_store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn gather_service_stats(state: &ApiState) -> ServiceStats {
        ServiceStats {
            players_waiting: state.scheduler.queue_size().unwrap_or_default(),
            matches_created: state.scheduler.match_count().unwrap_or_default(),
            scheduler: state.scheduler.stats().unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
