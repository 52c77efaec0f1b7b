//! duo-tracker - Duo match tracker entry point
//!
//! Subcommands:
//! - `run`: sync now, then every `sync_interval_minutes` until Ctrl+C
//! - `fetch-once`: a single sync with a 24 hour series window
//! - `recompute-series`: series detection over every stored match
//! - `recompute-ratings`: full rating rebuild
//! - `seed-players`: upsert configured players

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use duo_common::config::{CliOverrides, TomlConfig};
use duo_common::TrackerConfig;
use duo_tracker::services::PolicyKind;
use duo_tracker::{BattleLogClient, SyncOrchestrator};
use std::path::PathBuf;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Series window used by `fetch-once`
const FETCH_ONCE_WINDOW_HOURS: i64 = 24;

/// Command-line arguments for duo-tracker
#[derive(Parser, Debug)]
#[command(name = "duo-tracker")]
#[command(about = "Tracks 2v2 duo matches, best-of-7 series and player ratings")]
#[command(version)]
struct Args {
    /// TOML config file (default: <config dir>/duo-tracker/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file (overrides DUO_DATABASE and the config file)
    #[arg(long, global = true, value_name = "FILE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync immediately, then on every interval until Ctrl+C
    Run,
    /// Run a single sync cycle
    FetchOnce,
    /// Detect series across all stored matches
    RecomputeSeries,
    /// Rebuild the rating history from all stored series
    RecomputeRatings {
        /// Rating policy: logistic or fixed-step
        #[arg(long, default_value_t = PolicyKind::Logistic)]
        policy: PolicyKind,
    },
    /// Insert configured players and their names
    SeedPlayers,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let cli = CliOverrides {
        config_path: args.config.clone(),
        database_path: args.database.clone(),
    };
    // The TOML file is read before logging starts so its level applies;
    // failures are reported once the subscriber is up.
    let config_file = TomlConfig::locate(cli.config_path.as_deref());
    let toml_config = TomlConfig::load(config_file.as_deref());
    let level = toml_config
        .as_ref()
        .map(|t| t.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)),
        )
        .init();

    info!(
        "Starting duo-tracker v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_file {
        Some(path) => info!("Loading config file: {}", path.display()),
        None => info!("No config file found, using environment and defaults"),
    }
    let config = toml_config.and_then(|t| TrackerConfig::resolve(&cli, t, config_file));

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(e).context("Configuration error, nothing processed");
        }
    };
    info!(
        players = config.player_tags.len(),
        mode_id = config.target_mode_id,
        "Database path: {}",
        config.database_path.display()
    );

    let pool = duo_common::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    match args.command {
        Command::Run => {
            let feed = BattleLogClient::from_config(&config)?;
            let orchestrator = SyncOrchestrator::new(pool, config);
            run_scheduler(&orchestrator, &feed).await?;
        }
        Command::FetchOnce => {
            let feed = BattleLogClient::from_config(&config)?;
            let orchestrator = SyncOrchestrator::new(pool, config);
            let report = orchestrator
                .sync_once(&feed, Some(Duration::hours(FETCH_ONCE_WINDOW_HOURS)))
                .await?;
            info!(
                new_matches = report.new_matches,
                new_series = report.new_series,
                "Fetch complete"
            );
        }
        Command::RecomputeSeries => {
            let orchestrator = SyncOrchestrator::new(pool, config);
            let inserted = orchestrator.detect_series(None).await?;
            info!(new_series = inserted, "Recomputed series across all matches");
        }
        Command::RecomputeRatings { policy } => {
            let orchestrator = SyncOrchestrator::with_policy(pool, config, policy.build());
            let rows = orchestrator.recompute_ratings().await?;
            info!(policy = %policy, rows, "Rating rebuild done");
        }
        Command::SeedPlayers => {
            let orchestrator = SyncOrchestrator::new(pool, config);
            let changed = orchestrator.seed_players().await?;
            info!(changed, "Players seeded");
        }
    }

    Ok(())
}

/// Sync immediately, then once per interval, until a shutdown signal.
///
/// A failed cycle is logged and the next one runs on schedule.
async fn run_scheduler(orchestrator: &SyncOrchestrator, feed: &BattleLogClient) -> Result<()> {
    let period = std::time::Duration::from_secs(orchestrator.config().sync_interval_minutes * 60);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(
        interval_minutes = orchestrator.config().sync_interval_minutes,
        "Scheduler started"
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = orchestrator.sync_once(feed, orchestrator.default_window()).await {
                    error!(error = %e, "Sync cycle failed");
                }
            }
            _ = &mut shutdown => break,
        }
    }

    info!("Scheduler stopped");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
