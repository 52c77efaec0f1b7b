//! Finalized series rows

use super::parse_stored_time;
use crate::error::{SyncError, SyncResult};
use crate::models::{Duo, SeriesRecord, Side};
use duo_common::time::to_db_string;
use sqlx::{Row, SqliteConnection};

pub async fn series_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM series WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Insert a series unless a row with the same id or the same
/// (teams, start time) already exists.
///
/// Returns `true` when a row was written.
pub async fn insert_series(conn: &mut SqliteConnection, series: &SeriesRecord) -> SyncResult<bool> {
    let game_ids = serde_json::to_string(&series.game_ids)
        .map_err(|e| SyncError::CorruptData(format!("series game ids: {}", e)))?;

    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO series (
            id, started_at, ended_at, mode_id,
            team_a_tag1, team_a_tag2, team_b_tag1, team_b_tag2,
            winner_team, game_ids
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&series.id)
    .bind(to_db_string(&series.started_at))
    .bind(to_db_string(&series.ended_at))
    .bind(series.mode_id)
    .bind(series.team_a.first())
    .bind(series.team_a.second())
    .bind(series.team_b.first())
    .bind(series.team_b.second())
    .bind(series.winner.code())
    .bind(game_ids)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// All stored series in rating order: (ended_at, started_at, id)
pub async fn load_series_ordered(conn: &mut SqliteConnection) -> SyncResult<Vec<SeriesRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, started_at, ended_at, mode_id,
               team_a_tag1, team_a_tag2, team_b_tag1, team_b_tag2,
               winner_team, game_ids
        FROM series
        ORDER BY ended_at, started_at, id
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| -> SyncResult<SeriesRecord> {
            let id: String = row.try_get("id")?;
            let started_at: String = row.try_get("started_at")?;
            let ended_at: String = row.try_get("ended_at")?;
            let winner: String = row.try_get("winner_team")?;
            let game_ids: String = row.try_get("game_ids")?;
            Ok(SeriesRecord {
                started_at: parse_stored_time(&started_at, "series.started_at")?,
                ended_at: parse_stored_time(&ended_at, "series.ended_at")?,
                mode_id: row.try_get("mode_id")?,
                team_a: Duo::new(
                    row.try_get::<String, _>("team_a_tag1")?,
                    row.try_get::<String, _>("team_a_tag2")?,
                ),
                team_b: Duo::new(
                    row.try_get::<String, _>("team_b_tag1")?,
                    row.try_get::<String, _>("team_b_tag2")?,
                ),
                winner: Side::from_code(&winner).ok_or_else(|| {
                    SyncError::CorruptData(format!("series {} winner_team {:?}", id, winner))
                })?,
                game_ids: serde_json::from_str(&game_ids).map_err(|e| {
                    SyncError::CorruptData(format!("series {} game_ids: {}", id, e))
                })?,
                id,
            })
        })
        .collect()
}

pub async fn count_series(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM series")
        .fetch_one(&mut *conn)
        .await
}
