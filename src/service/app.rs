//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the scheduler,
//! the HTTP API and the background tasks together.

use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::scheduler::MatchScheduler;
use crate::service::http::{ApiServer, ApiServerConfig, ApiState};
use crate::store::{InMemoryMatchStore, MatchStore};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Core matchmaking component
    scheduler: Arc<MatchScheduler>,

    /// Metrics collector shared with the scheduler
    metrics_collector: Arc<MetricsCollector>,

    /// HTTP API server
    api_server: Arc<ApiServer>,

    /// State shared with the HTTP handlers
    api_state: ApiState,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application with the in-memory match store
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_components(
            config,
            Arc::new(InMemoryMatchStore::new()),
            Arc::new(SystemClock),
        )
    }

    /// Initialize the application with explicit collaborators
    pub fn with_components(
        config: AppConfig,
        store: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing role-queue matchmaking service");
        info!(
            "Configuration: service={}, http={}:{}, max_skill_difference={}",
            config.service.name,
            config.service.http_host,
            config.service.http_port,
            config.matchmaking.max_skill_difference
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let scheduler = Arc::new(
            MatchScheduler::with_metrics(
                config.matchmaking.clone(),
                store,
                clock,
                metrics_collector.clone(),
            )
            .map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create match scheduler: {}", e),
            })?,
        );

        let is_running = Arc::new(RwLock::new(false));
        let api_state = ApiState {
            scheduler: scheduler.clone(),
            metrics_collector: metrics_collector.clone(),
            is_running: is_running.clone(),
            service_name: config.service.name.clone(),
        };
        let api_server = Arc::new(ApiServer::new(
            ApiServerConfig {
                port: config.service.http_port,
                host: config.service.http_host.clone(),
            },
            api_state.clone(),
        ));

        Ok(Self {
            config,
            scheduler,
            metrics_collector,
            api_server,
            api_state,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    /// Start the HTTP API and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting role-queue matchmaking service");

        *self.is_running.write().await = true;

        self.start_api_server().await?;
        self.start_background_tasks().await?;

        info!("Role-queue matchmaking service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of role-queue service");

        *self.is_running.write().await = false;

        if let Err(e) = self.api_server.stop().await {
            warn!("Failed to stop API server: {}", e);
        }

        self.stop_background_tasks().await;

        let final_stats = self
            .scheduler
            .stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get final stats: {}", e),
            })?;
        let still_waiting = self.scheduler.queue_size().unwrap_or_default();

        info!("Final scheduler statistics: {:?}", final_stats);
        info!("{} players were still waiting at shutdown", still_waiting);
        info!("Role-queue service shutdown completed");

        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn scheduler(&self) -> Arc<MatchScheduler> {
        self.scheduler.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    /// State handed to HTTP handlers and health checks
    pub fn api_state(&self) -> ApiState {
        self.api_state.clone()
    }

    async fn start_api_server(&mut self) -> Result<(), ServiceError> {
        info!("Starting HTTP API, health and metrics endpoints");

        let api_server = self.api_server.clone();
        let port = self.config.service.http_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = api_server.start().await {
                error!("API server failed: {}", e);
            } else {
                info!("API server task completed");
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("API server started on port {}", port);
        Ok(())
    }

    /// Start the scheduler tick and service metrics tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        let tick_interval = self.config.tick_interval();
        info!(
            "Starting match scheduler task ({}ms interval)...",
            tick_interval.as_millis()
        );

        let scheduler_task = {
            let scheduler = self.scheduler.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(tick_interval);
                info!("Match scheduler task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let scheduler = scheduler.clone();
                    match tokio::task::spawn_blocking(move || scheduler.drain()).await {
                        Ok(Ok(matches)) if !matches.is_empty() => {
                            info!("Scheduler tick created {} matches", matches.len());
                        }
                        Ok(Ok(_)) => debug!("Scheduler tick created no matches"),
                        Ok(Err(e)) => warn!("Scheduler tick failed: {}", e),
                        Err(e) => error!("Scheduler tick panicked: {}", e),
                    }
                }

                info!("Match scheduler task stopped");
            })
        };

        info!("Starting service metrics task (60s interval)...");
        let service_metrics_task = {
            let metrics_collector = self.metrics_collector.clone();
            let scheduler = self.scheduler.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                let start_time = tokio::time::Instant::now();
                info!("Service metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    metrics_collector.update_uptime(start_time.elapsed());
                    match scheduler.queue_size() {
                        Ok(size) => {
                            metrics_collector.set_queue_size(size);
                            metrics_collector.update_component_health("waiting_pool", true);
                        }
                        Err(e) => {
                            warn!("Failed to read queue size for metrics: {}", e);
                            metrics_collector.update_component_health("waiting_pool", false);
                        }
                    }

                    debug!(
                        "Updated service metrics - uptime: {}s",
                        start_time.elapsed().as_secs()
                    );
                }

                info!("Service metrics task stopped");
            })
        };

        self.background_tasks.push(scheduler_task);
        self.background_tasks.push(service_metrics_task);

        info!("2 background tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        info!("All {} background tasks stopped", task_count);
    }
}
