//! Canonical match rows
//!
//! A match is written once: the game row, one participation row per player
//! and that player's card list. Existence is checked by content-hash id.

use super::parse_stored_time;
use super::players::register_player;
use crate::error::{SyncError, SyncResult};
use crate::models::{Duo, MatchRecord, MatchSummary, Winner};
use chrono::{DateTime, Utc};
use duo_common::time::to_db_string;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

/// Check whether a match id is already stored
pub async fn match_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM games WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(found.is_some())
}

/// Write a match with its participation and card rows.
///
/// The caller is expected to have checked [`match_exists`] inside the same
/// transaction; a second insert of the same id fails on the primary key.
pub async fn insert_match(conn: &mut SqliteConnection, record: &MatchRecord) -> Result<(), sqlx::Error> {
    for p in &record.participants {
        register_player(&mut *conn, &p.tag).await?;
    }

    sqlx::query(
        r#"
        INSERT INTO games (
            id, battle_time, type, mode_id, event_tag,
            team_a_tag1, team_a_tag2, team_b_tag1, team_b_tag2,
            team_a_crowns, team_b_crowns, winner_team
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(to_db_string(&record.battle_time))
    .bind(&record.match_type)
    .bind(record.mode_id)
    .bind(&record.event_tag)
    .bind(record.team_a.first())
    .bind(record.team_a.second())
    .bind(record.team_b.first())
    .bind(record.team_b.second())
    .bind(record.team_a_crowns)
    .bind(record.team_b_crowns)
    .bind(record.winner.code())
    .execute(&mut *conn)
    .await?;

    for p in &record.participants {
        sqlx::query(
            r#"
            INSERT INTO game_players (game_id, player_tag, team, crowns, elixir_leaked)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&p.tag)
        .bind(p.side.code())
        .bind(p.crowns)
        .bind(p.elixir_leaked)
        .execute(&mut *conn)
        .await?;

        // Decks may list the same card twice in mirror modes
        for card_id in &p.card_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO game_player_cards (game_id, player_tag, card_id) VALUES (?, ?, ?)",
            )
            .bind(&record.id)
            .bind(&p.tag)
            .bind(card_id)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(())
}

/// Load stored matches of one mode in (time, id) order.
///
/// With `since`, only matches at or after that instant are returned.
pub async fn load_match_summaries(
    conn: &mut SqliteConnection,
    mode_id: i64,
    since: Option<DateTime<Utc>>,
) -> SyncResult<Vec<MatchSummary>> {
    let rows = match since {
        Some(since) => {
            sqlx::query(
                r#"
                SELECT id, battle_time, mode_id, team_a_tag1, team_a_tag2,
                       team_b_tag1, team_b_tag2, winner_team
                FROM games
                WHERE mode_id = ? AND battle_time >= ?
                ORDER BY battle_time, id
                "#,
            )
            .bind(mode_id)
            .bind(to_db_string(&since))
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT id, battle_time, mode_id, team_a_tag1, team_a_tag2,
                       team_b_tag1, team_b_tag2, winner_team
                FROM games
                WHERE mode_id = ?
                ORDER BY battle_time, id
                "#,
            )
            .bind(mode_id)
            .fetch_all(&mut *conn)
            .await?
        }
    };

    rows.iter().map(summary_from_row).collect()
}

/// Load one pair's matches strictly before `before`, newest first.
///
/// `team_a` and `team_b` are the canonical sides of the pair.
pub async fn load_pair_matches_before(
    conn: &mut SqliteConnection,
    mode_id: i64,
    team_a: &Duo,
    team_b: &Duo,
    before: DateTime<Utc>,
) -> SyncResult<Vec<MatchSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, battle_time, mode_id, team_a_tag1, team_a_tag2,
               team_b_tag1, team_b_tag2, winner_team
        FROM games
        WHERE mode_id = ?
          AND team_a_tag1 = ? AND team_a_tag2 = ?
          AND team_b_tag1 = ? AND team_b_tag2 = ?
          AND battle_time < ?
        ORDER BY battle_time DESC, id DESC
        "#,
    )
    .bind(mode_id)
    .bind(team_a.first())
    .bind(team_a.second())
    .bind(team_b.first())
    .bind(team_b.second())
    .bind(to_db_string(&before))
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(summary_from_row).collect()
}

fn summary_from_row(row: &SqliteRow) -> SyncResult<MatchSummary> {
    let battle_time: String = row.try_get("battle_time")?;
    let winner: String = row.try_get("winner_team")?;
    Ok(MatchSummary {
        id: row.try_get("id")?,
        battle_time: parse_stored_time(&battle_time, "games.battle_time")?,
        mode_id: row.try_get("mode_id")?,
        team_a: Duo::new(
            row.try_get::<String, _>("team_a_tag1")?,
            row.try_get::<String, _>("team_a_tag2")?,
        ),
        team_b: Duo::new(
            row.try_get::<String, _>("team_b_tag1")?,
            row.try_get::<String, _>("team_b_tag2")?,
        ),
        winner: Winner::from_code(&winner)
            .ok_or_else(|| SyncError::CorruptData(format!("games.winner_team {:?}", winner)))?,
    })
}

/// Total number of stored matches
pub async fn count_matches(conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM games")
        .fetch_one(&mut *conn)
        .await
}
