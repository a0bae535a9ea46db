//! Main entry point for the Role Queue matchmaking service
//!
//! This is the production entry point that initializes and runs the
//! matchmaking service with configuration loading, logging, and graceful
//! shutdown.

use anyhow::Result;
use clap::Parser;
use role_queue::config::{validate_config, AppConfig};
use role_queue::service::{AppState, HealthCheck, HealthStatus};
use std::path::PathBuf;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Role Queue Matchmaking Service - role-aware 5v5 match drafting
#[derive(Parser)]
#[command(
    name = "role-queue",
    version,
    about = "A role-aware matchmaking service that drafts balanced 5v5 matches",
    long_about = "Role Queue keeps a skill-indexed waiting pool, selects tight skill windows, \
                 assigns every participant a role slot from their preferences and splits the \
                 group into two teams of even effective skill."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Skill difference threshold override
    #[arg(
        long,
        value_name = "POINTS",
        help = "Override the largest accepted team skill difference"
    )]
    max_skill_difference: Option<i64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    let mm = &config.matchmaking;
    info!("Role Queue Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.http_host, config.service.http_port
    );
    info!("   Tick interval: {}ms", config.service.tick_interval_ms);
    info!(
        "   Match size: {} ({} per team)",
        mm.players_per_match, mm.players_per_team
    );
    info!(
        "   Penalties: primary {}, secondary {}, autofill {}",
        mm.penalties.primary, mm.penalties.secondary, mm.penalties.autofill
    );
    info!("   Max skill difference: {}", mm.max_skill_difference);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from file or environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(max_skill_difference) = args.max_skill_difference {
        config.matchmaking.max_skill_difference = max_skill_difference;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    // Periodic health logging
    let health_task = {
        let api_state = app_state.api_state();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            while api_state.is_running().await {
                interval.tick().await;
                match HealthCheck::check(&api_state).await {
                    Ok(health) if health.status == HealthStatus::Healthy => info!(
                        "Health check: {} - {} waiting, {} matches",
                        health.status, health.stats.players_waiting, health.stats.matches_created
                    ),
                    Ok(health) => warn!("Health check: {} - {:?}", health.status, health.checks),
                    Err(e) => warn!("Health check failed: {}", e),
                }
            }
        })
    };

    info!("Role Queue Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");
    health_task.abort();

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Role Queue Matchmaking Service stopped");
    Ok(())
}
