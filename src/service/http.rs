//! HTTP API, health and Prometheus endpoints
//!
//! This module exposes the queue and matchmaking operations of the
//! [`MatchScheduler`] over HTTP using Axum, next to the health checks and
//! the metrics scrape endpoint.

use crate::error::MatchmakingError;
use crate::metrics::MetricsCollector;
use crate::scheduler::{MatchScheduler, QueueStats, QueueStatus};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{MatchOutcome, MatchRecord, Participant, PlayerId, Role, Skill};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Highest skill accepted by the enqueue endpoint
pub const MAX_ENQUEUE_SKILL: Skill = 3000;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to bind the API server to
    pub port: u16,
    /// Host to bind to (typically "0.0.0.0" for all interfaces)
    pub host: String,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// Shared state for the API handlers
#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<MatchScheduler>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub is_running: Arc<RwLock<bool>>,
    pub service_name: String,
}

impl ApiState {
    pub fn new(scheduler: Arc<MatchScheduler>, service_name: impl Into<String>) -> Self {
        Self {
            metrics_collector: scheduler.metrics(),
            scheduler,
            is_running: Arc::new(RwLock::new(false)),
            service_name: service_name.into(),
        }
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }
}

/// Body of `POST /api/queue/enqueue`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub player_id: PlayerId,
    pub display_name: String,
    pub skill: Skill,
    pub primary_role: Role,
    pub secondary_role: Role,
}

impl EnqueueRequest {
    /// Validate the request and build the participant it describes
    pub fn into_participant(self) -> crate::error::Result<Participant> {
        if self.skill > MAX_ENQUEUE_SKILL {
            return Err(MatchmakingError::InvalidParticipant {
                reason: format!(
                    "skill {} exceeds the maximum of {}",
                    self.skill, MAX_ENQUEUE_SKILL
                ),
            }
            .into());
        }
        Participant::new(
            self.player_id,
            self.display_name,
            self.skill,
            self.primary_role,
            self.secondary_role,
        )
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error returned by API handlers
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        let status = match err.downcast_ref::<MatchmakingError>() {
            Some(MatchmakingError::AlreadyQueued { .. })
            | Some(MatchmakingError::InvalidParticipant { .. }) => StatusCode::BAD_REQUEST,
            Some(MatchmakingError::MatchNotFound { .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("API request failed: {:#}", err);
        } else {
            debug!("API request rejected: {}", err);
        }
        Self::new(status, err.to_string())
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// HTTP server for the queue API and monitoring endpoints
pub struct ApiServer {
    config: ApiServerConfig,
    state: ApiState,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(config: ApiServerConfig, state: ApiState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Start the API server and serve until [`stop`](Self::stop) is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid API server address")?;

        let app = self.router();
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("API server shutdown signal received");
            })
            .await?;

        info!("API server stopped");
        Ok(())
    }

    /// Create the Axum router with every endpoint
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Stop the API server
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping API server...");

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to API server: {}", e);
        }

        Ok(())
    }
}

/// Build the router for `state`
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/queue/enqueue", post(enqueue_handler))
        .route("/api/queue/dequeue/{player_id}", delete(dequeue_handler))
        .route("/api/queue/status/{player_id}", get(queue_status_handler))
        .route("/api/queue/size", get(queue_size_handler))
        .route("/api/queue/stats", get(queue_stats_handler))
        .route("/api/queue/players", get(queue_players_handler))
        .route("/api/matchmaking/create", post(create_match_handler))
        .route("/api/matchmaking/match/{match_id}", get(get_match_handler))
        .route("/api/matchmaking/matches", get(all_matches_handler))
        .route("/api/matchmaking/config", get(config_handler))
        .with_state(state)
}

/// Root endpoint handler - shows service information
async fn root_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "service": state.service_name,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "/health",
            "/ready",
            "/metrics",
            "/api/queue",
            "/api/matchmaking"
        ]
    }))
}

/// Lightweight health check endpoint handler
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    debug!("Health check requested");

    match HealthCheck::check(&state).await {
        Ok(health) => {
            let code = match health.status {
                HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::OK,
            };
            (code, Json(json!(health)))
        }
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "service": state.service_name,
                    "error": e.to_string()
                })),
            )
        }
    }
}

/// Readiness check endpoint handler
async fn ready_handler(State(state): State<ApiState>) -> impl IntoResponse {
    match HealthCheck::readiness_check(&state).await {
        HealthStatus::Healthy => (StatusCode::OK, "Ready"),
        HealthStatus::Degraded => (StatusCode::OK, "Degraded but ready"),
        HealthStatus::Unhealthy => (StatusCode::SERVICE_UNAVAILABLE, "Not ready"),
    }
}

/// Prometheus metrics endpoint handler
async fn metrics_handler(State(state): State<ApiState>) -> Response {
    match state.metrics_collector.gather_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn enqueue_handler(
    State(state): State<ApiState>,
    Json(request): Json<EnqueueRequest>,
) -> ApiResult<Json<QueueStatus>> {
    let timer = state.metrics_collector.start_timer();
    let participant = request.into_participant()?;
    let entry = state.scheduler.enqueue(participant)?;
    let status = QueueStatus::from_entry(&entry, state.scheduler.now());
    state
        .metrics_collector
        .record_api_request("enqueue", timer.stop());
    Ok(Json(status))
}

async fn dequeue_handler(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    if state.scheduler.dequeue(&player_id)? {
        Ok(Json(json!({ "removed": true, "player_id": player_id })))
    } else {
        Err(ApiError::not_found(format!(
            "Player {} is not in queue",
            player_id
        )))
    }
}

async fn queue_status_handler(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> ApiResult<Json<QueueStatus>> {
    state
        .scheduler
        .queue_status(&player_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Player {} is not in queue", player_id)))
}

async fn queue_size_handler(State(state): State<ApiState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(json!({ "size": state.scheduler.queue_size()? })))
}

async fn queue_stats_handler(State(state): State<ApiState>) -> ApiResult<Json<QueueStats>> {
    Ok(Json(state.scheduler.queue_stats()?))
}

async fn queue_players_handler(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<QueueStatus>>> {
    let now = state.scheduler.now();
    let players = state
        .scheduler
        .all_waiting()?
        .iter()
        .map(|entry| QueueStatus::from_entry(entry, now))
        .collect();
    Ok(Json(players))
}

async fn create_match_handler(State(state): State<ApiState>) -> ApiResult<Response> {
    let timer = state.metrics_collector.start_timer();
    let outcome = state.scheduler.attempt_match()?;
    state
        .metrics_collector
        .record_api_request("create_match", timer.stop());

    Ok(match outcome {
        MatchOutcome::Matched(record) => Json(record).into_response(),
        MatchOutcome::Failed(reason) => Json(json!({
            "success": false,
            "reason": reason.label(),
            "message": reason.to_string(),
            "details": reason,
        }))
        .into_response(),
    })
}

async fn get_match_handler(
    State(state): State<ApiState>,
    Path(match_id): Path<String>,
) -> ApiResult<Json<MatchRecord>> {
    let not_found = || {
        ApiError::from(anyhow::Error::from(MatchmakingError::MatchNotFound {
            match_id: match_id.clone(),
        }))
    };

    let id = Uuid::parse_str(&match_id).map_err(|_| not_found())?;
    state
        .scheduler
        .find_match(&id)?
        .map(Json)
        .ok_or_else(not_found)
}

async fn all_matches_handler(State(state): State<ApiState>) -> ApiResult<Json<Vec<MatchRecord>>> {
    Ok(Json(state.scheduler.all_matches()?))
}

async fn config_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.scheduler.config().clone())
}
