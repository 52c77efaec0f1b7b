//! Tracked player rows

use sqlx::SqliteConnection;

/// Insert configured players, filling in a missing display name.
///
/// Returns the number of rows inserted or updated.
pub async fn seed_players<'a, I>(conn: &mut SqliteConnection, players: I) -> Result<u64, sqlx::Error>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut changed = 0;
    for (tag, name) in players {
        let result = sqlx::query(
            r#"
            INSERT INTO players (tag, name) VALUES (?, ?)
            ON CONFLICT(tag) DO UPDATE SET name = excluded.name
            WHERE players.name IS NULL OR players.name = ''
            "#,
        )
        .bind(tag)
        .bind(name)
        .execute(&mut *conn)
        .await?;
        changed += result.rows_affected();
    }
    Ok(changed)
}

/// Make sure a participant has a player row (name unknown)
pub async fn register_player(conn: &mut SqliteConnection, tag: &str) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT OR IGNORE INTO players (tag) VALUES (?)")
        .bind(tag)
        .execute(&mut *conn)
        .await?;
    Ok(())
}
