//! Tests for database initialization

use duo_common::db::init::{init_database, init_schema, CURRENT_SCHEMA_VERSION};
use sqlx::sqlite::SqlitePoolOptions;

async fn table_names(pool: &sqlx::SqlitePool) -> Vec<String> {
    sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .fetch_all(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("duo.db");

    let pool = init_database(&db_path).await;
    assert!(pool.is_ok(), "Database initialization failed: {:?}", pool.err());
    assert!(db_path.exists(), "Database file was not created");
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("duo.db");

    let pool1 = init_database(&db_path).await.unwrap();
    pool1.close().await;

    let pool2 = init_database(&db_path).await;
    assert!(pool2.is_ok(), "Failed to open existing database: {:?}", pool2.err());

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(&pool2.unwrap())
        .await
        .unwrap();
    assert_eq!(versions, 1, "schema version must be recorded once");
}

#[tokio::test]
async fn test_schema_has_all_tables() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();
    init_schema(&pool).await.unwrap();

    let tables = table_names(&pool).await;
    for expected in [
        "game_player_cards",
        "game_players",
        "games",
        "players",
        "rating_history",
        "schema_version",
        "series",
    ] {
        assert!(tables.contains(&expected.to_string()), "missing table {}", expected);
    }

    let version: i32 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_winner_constraint_rejects_unknown_code() {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init_schema(&pool).await.unwrap();

    let result = sqlx::query(
        r#"
        INSERT INTO games (id, battle_time, type, mode_id, team_a_tag1, team_a_tag2,
                           team_b_tag1, team_b_tag2, team_a_crowns, team_b_crowns, winner_team)
        VALUES ('g1', '2025-01-01T00:00:00.000Z', 'clanMate2v2', 1, 'A', 'B', 'C', 'D', 1, 0, 'X')
        "#,
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}
