//! Main application configuration
//!
//! This module defines the primary configuration structures for the role-queue
//! matchmaking service, including file and environment variable loading and validation.

use crate::config::matchmaking::MatchmakingConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP API binds to
    pub http_host: String,
    /// Port for the HTTP API, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Interval between scheduled match attempts in milliseconds
    pub tick_interval_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "role-queue".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
            tick_interval_ms: 1000,
        }
    }
}

/// Parse an environment variable into `target` when it is set
fn env_override<T: FromStr>(key: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(key) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", key, raw))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        env_override("SERVICE_NAME", &mut self.service.name)?;
        env_override("LOG_LEVEL", &mut self.service.log_level)?;
        env_override("HTTP_HOST", &mut self.service.http_host)?;
        env_override("HTTP_PORT", &mut self.service.http_port)?;
        env_override(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut self.service.shutdown_timeout_seconds,
        )?;
        env_override("TICK_INTERVAL_MS", &mut self.service.tick_interval_ms)?;

        // Matchmaking settings
        let mm = &mut self.matchmaking;
        env_override("PLAYERS_PER_TEAM", &mut mm.players_per_team)?;
        if env::var("PLAYERS_PER_TEAM").is_ok() {
            mm.players_per_match = mm.players_per_team * 2;
        }
        env_override("SECONDARY_PENALTY", &mut mm.penalties.secondary)?;
        env_override("AUTOFILL_PENALTY", &mut mm.penalties.autofill)?;
        env_override("MAX_SKILL_DIFFERENCE", &mut mm.max_skill_difference)?;
        env_override("SKILL_BUCKET_WIDTH", &mut mm.skill_bucket_width)?;
        env_override("COMMIT_RETRIES", &mut mm.commit_retries)?;

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get the scheduler tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.service.tick_interval_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.service.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }

    config.matchmaking.validate()
}
