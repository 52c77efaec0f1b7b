//! Database initialization
//!
//! Creates the database file on first run and the schema on every start.
//! All statements are idempotent (`CREATE ... IF NOT EXISTS`).

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when the table layout changes
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Open (or create) the database file and make sure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // One writer per run; a small pool is enough.
    // WAL lets the reporting layer read while a batch is being written.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000))
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    init_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes on an already-open pool
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_players_table(pool).await?;
    create_games_table(pool).await?;
    create_game_players_table(pool).await?;
    create_game_player_cards_table(pool).await?;
    create_series_table(pool).await?;
    create_rating_history_table(pool).await?;

    record_schema_version(pool).await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_schema_version(pool: &SqlitePool) -> Result<()> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    match version {
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
                .bind(CURRENT_SCHEMA_VERSION)
                .execute(pool)
                .await?;
            info!("Database schema created (v{})", CURRENT_SCHEMA_VERSION);
        }
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            warn!(
                "Database schema version ({}) is newer than code version ({})",
                v, CURRENT_SCHEMA_VERSION
            );
        }
        Some(v) => info!("Database schema is up to date (v{})", v),
    }

    Ok(())
}

/// Tracked players and their display names
async fn create_players_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS players (
            tag TEXT PRIMARY KEY,
            name TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Canonical match records
///
/// `team_a_*` is always the lexicographically smaller duo.
async fn create_games_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id TEXT PRIMARY KEY,
            battle_time TEXT NOT NULL,
            type TEXT NOT NULL,
            mode_id INTEGER NOT NULL,
            event_tag TEXT,
            team_a_tag1 TEXT NOT NULL,
            team_a_tag2 TEXT NOT NULL,
            team_b_tag1 TEXT NOT NULL,
            team_b_tag2 TEXT NOT NULL,
            team_a_crowns INTEGER NOT NULL,
            team_b_crowns INTEGER NOT NULL,
            winner_team TEXT NOT NULL CHECK (winner_team IN ('A', 'B', 'D'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_battle_time ON games(battle_time)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_mode_time ON games(mode_id, battle_time)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Per-participant contribution rows
async fn create_game_players_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS game_players (
            game_id TEXT NOT NULL REFERENCES games(id) ON DELETE CASCADE,
            player_tag TEXT NOT NULL REFERENCES players(tag) ON DELETE RESTRICT,
            team TEXT NOT NULL CHECK (team IN ('A', 'B')),
            crowns INTEGER NOT NULL,
            elixir_leaked REAL NOT NULL,
            PRIMARY KEY (game_id, player_tag)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_game_players_tag ON game_players(player_tag)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_game_player_cards_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS game_player_cards (
            game_id TEXT NOT NULL,
            player_tag TEXT NOT NULL,
            card_id INTEGER NOT NULL,
            PRIMARY KEY (game_id, player_tag, card_id),
            FOREIGN KEY (game_id, player_tag)
                REFERENCES game_players(game_id, player_tag) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Finalized best-of-7 series
async fn create_series_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            ended_at TEXT NOT NULL,
            mode_id INTEGER NOT NULL,
            team_a_tag1 TEXT NOT NULL,
            team_a_tag2 TEXT NOT NULL,
            team_b_tag1 TEXT NOT NULL,
            team_b_tag2 TEXT NOT NULL,
            winner_team TEXT NOT NULL CHECK (winner_team IN ('A', 'B')),
            game_ids TEXT NOT NULL,
            CONSTRAINT uq_series_pair_time UNIQUE (
                team_a_tag1, team_a_tag2, team_b_tag1, team_b_tag2, started_at
            )
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_series_ended_at ON series(ended_at, started_at, id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Append-only rating history, regenerated on every recompute
///
/// The autoincrement id preserves insertion order for equal timestamps.
async fn create_rating_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rating_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_tag TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            rating INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_rating_history_player ON rating_history(player_tag, timestamp, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
