//! Rating history rows
//!
//! The table is derived data: a recompute clears it and appends the full
//! history again inside one transaction.

use super::parse_stored_time;
use crate::error::SyncResult;
use crate::models::RatingSnapshot;
use duo_common::time::to_db_string;
use sqlx::{Row, SqliteConnection};

/// Delete every rating row; returns the number removed
pub async fn clear_rating_history(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM rating_history")
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

/// Append snapshots in the given order
pub async fn insert_snapshots(
    conn: &mut SqliteConnection,
    snapshots: &[RatingSnapshot],
) -> Result<(), sqlx::Error> {
    for snapshot in snapshots {
        sqlx::query("INSERT INTO rating_history (player_tag, timestamp, rating) VALUES (?, ?, ?)")
            .bind(&snapshot.player_tag)
            .bind(to_db_string(&snapshot.timestamp))
            .bind(snapshot.rating)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Full history in insertion order
pub async fn load_rating_history(conn: &mut SqliteConnection) -> SyncResult<Vec<RatingSnapshot>> {
    let rows = sqlx::query("SELECT player_tag, timestamp, rating FROM rating_history ORDER BY id")
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| -> SyncResult<RatingSnapshot> {
            let timestamp: String = row.try_get("timestamp")?;
            Ok(RatingSnapshot {
                player_tag: row.try_get("player_tag")?,
                timestamp: parse_stored_time(&timestamp, "rating_history.timestamp")?,
                rating: row.try_get("rating")?,
            })
        })
        .collect()
}

/// Latest stored rating per player, highest first
pub async fn latest_ratings(conn: &mut SqliteConnection) -> Result<Vec<(String, i64)>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT h.player_tag, h.rating
        FROM rating_history h
        WHERE h.id = (
            SELECT MAX(id) FROM rating_history WHERE player_tag = h.player_tag
        )
        ORDER BY h.rating DESC, h.player_tag
        "#,
    )
    .fetch_all(&mut *conn)
    .await
}
