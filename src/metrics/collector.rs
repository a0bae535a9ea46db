//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the role-queue matchmaking
//! service using Prometheus metrics.

use crate::types::{FailureReason, MatchRecord};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Waiting pool metrics
    queue_metrics: QueueMetrics,

    /// Match attempt and outcome metrics
    match_metrics: MatchMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Waiting pool metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total participants accepted into the pool
    pub participants_enqueued_total: IntCounter,

    /// Total participants that left the pool without a match
    pub participants_dequeued_total: IntCounter,

    /// Participants currently waiting
    pub queue_size: IntGauge,

    /// Time spent waiting by participants placed in a match
    pub wait_time_at_match_seconds: Histogram,

    /// Skill of enqueued participants
    pub skill_distribution: Histogram,
}

/// Match attempt and outcome metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Total matches committed
    pub matches_created_total: IntCounter,

    /// Failed attempts by reason
    pub attempts_failed_total: IntCounterVec,

    /// Role assignments in committed matches by kind
    pub role_assignments_total: IntCounterVec,

    /// Effective skill difference of committed matches
    pub skill_difference: Histogram,

    /// Average raw skill of committed matches
    pub match_avg_skill: Histogram,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Duration of a whole match attempt, commit included
    pub attempt_duration: Histogram,

    /// HTTP API request durations
    pub api_request_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get waiting pool metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get match metrics
    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a participant entering the pool
    pub fn record_enqueued(&self, skill: u32, queue_size: usize) {
        self.queue_metrics.participants_enqueued_total.inc();
        self.queue_metrics
            .skill_distribution
            .observe(f64::from(skill));
        self.set_queue_size(queue_size);
    }

    /// Record a participant leaving the pool without a match
    pub fn record_dequeued(&self, queue_size: usize) {
        self.queue_metrics.participants_dequeued_total.inc();
        self.set_queue_size(queue_size);
    }

    pub fn set_queue_size(&self, queue_size: usize) {
        self.queue_metrics.queue_size.set(queue_size as i64);
    }

    /// Record a committed match and how long its participants waited
    pub fn record_match_created(&self, record: &MatchRecord, wait_seconds: &[i64]) {
        self.match_metrics.matches_created_total.inc();
        self.match_metrics
            .skill_difference
            .observe(record.skill_difference as f64);
        self.match_metrics
            .match_avg_skill
            .observe(record.avg_skill as f64);

        for assignment in record.assignments() {
            self.match_metrics
                .role_assignments_total
                .with_label_values(&[assignment.kind.as_str()])
                .inc();
        }

        for wait in wait_seconds {
            self.queue_metrics
                .wait_time_at_match_seconds
                .observe(*wait as f64);
        }
    }

    /// Record an attempt that ended without a match
    pub fn record_attempt_failed(&self, reason: &FailureReason) {
        self.match_metrics
            .attempts_failed_total
            .with_label_values(&[reason.label()])
            .inc();
    }

    /// Record the duration of a match attempt
    pub fn record_attempt_duration(&self, duration: Duration) {
        self.performance_metrics
            .attempt_duration
            .observe(duration.as_secs_f64());
    }

    /// Record an HTTP API request
    pub fn record_api_request(&self, endpoint: &str, duration: Duration) {
        self.performance_metrics
            .api_request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    /// Update service uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn gather_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("role_queue_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "role_queue_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("role_queue_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let participants_enqueued_total = IntCounter::new(
            "role_queue_participants_enqueued_total",
            "Total participants enqueued",
        )?;
        registry.register(Box::new(participants_enqueued_total.clone()))?;

        let participants_dequeued_total = IntCounter::new(
            "role_queue_participants_dequeued_total",
            "Total participants dequeued without a match",
        )?;
        registry.register(Box::new(participants_dequeued_total.clone()))?;

        let queue_size = IntGauge::new(
            "role_queue_queue_size",
            "Participants currently waiting in queue",
        )?;
        registry.register(Box::new(queue_size.clone()))?;

        let wait_time_at_match_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "role_queue_wait_time_at_match_seconds",
                "Queue wait time of matched participants",
            )
            .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(wait_time_at_match_seconds.clone()))?;

        let skill_distribution = Histogram::with_opts(
            HistogramOpts::new(
                "role_queue_skill_distribution",
                "Skill of enqueued participants",
            )
            .buckets(vec![
                500.0, 1000.0, 1500.0, 2000.0, 2500.0, 2800.0, 2900.0, 2950.0,
            ]),
        )?;
        registry.register(Box::new(skill_distribution.clone()))?;

        Ok(Self {
            participants_enqueued_total,
            participants_dequeued_total,
            queue_size,
            wait_time_at_match_seconds,
            skill_distribution,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_created_total =
            IntCounter::new("role_queue_matches_created_total", "Total matches created")?;
        registry.register(Box::new(matches_created_total.clone()))?;

        let attempts_failed_total = IntCounterVec::new(
            Opts::new(
                "role_queue_attempts_failed_total",
                "Match attempts that produced no match",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(attempts_failed_total.clone()))?;

        let role_assignments_total = IntCounterVec::new(
            Opts::new(
                "role_queue_role_assignments_total",
                "Role assignments in committed matches",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(role_assignments_total.clone()))?;

        let skill_difference = Histogram::with_opts(
            HistogramOpts::new(
                "role_queue_match_skill_difference",
                "Average effective skill difference between teams",
            )
            .buckets(vec![0.0, 5.0, 10.0, 25.0, 50.0, 75.0, 100.0, 200.0]),
        )?;
        registry.register(Box::new(skill_difference.clone()))?;

        let match_avg_skill = Histogram::with_opts(
            HistogramOpts::new("role_queue_match_avg_skill", "Average skill of matches")
                .buckets(vec![
                    500.0, 1000.0, 1500.0, 2000.0, 2500.0, 2800.0, 2900.0, 2950.0,
                ]),
        )?;
        registry.register(Box::new(match_avg_skill.clone()))?;

        Ok(Self {
            matches_created_total,
            attempts_failed_total,
            role_assignments_total,
            skill_difference,
            match_avg_skill,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let attempt_duration = Histogram::with_opts(
            HistogramOpts::new(
                "role_queue_attempt_duration_seconds",
                "Match attempt duration",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(attempt_duration.clone()))?;

        let api_request_duration = HistogramVec::new(
            HistogramOpts::new(
                "role_queue_api_request_duration_seconds",
                "HTTP API request duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(api_request_duration.clone()))?;

        Ok(Self {
            attempt_duration,
            api_request_duration,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
