//! Metrics for the role-queue matchmaking service
//!
//! This module provides Prometheus metrics collection for the waiting pool,
//! match attempts and service health.

pub mod collector;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, QueueMetrics,
    ServiceMetrics,
};
