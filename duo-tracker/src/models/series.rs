//! Finalized best-of-7 series

use super::game::{Duo, DuoPairKey, Side};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A resolved series: one side reached four decisive wins
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRecord {
    /// Hash of (pair key, chunk start time)
    pub id: String,
    /// Time of the first match of the chunk
    pub started_at: DateTime<Utc>,
    /// Time of the clinching match
    pub ended_at: DateTime<Utc>,
    pub mode_id: i64,
    /// Side A duo as canonicalized at chunk start
    pub team_a: Duo,
    pub team_b: Duo,
    pub winner: Side,
    /// Member match ids in play order, draws included
    pub game_ids: Vec<String>,
}

#[derive(Serialize)]
struct SeriesIdInput<'a> {
    teams: [[&'a str; 2]; 2],
    start: String,
}

impl SeriesRecord {
    /// Deterministic series id for a chunk of `key` starting at `started_at`
    pub fn series_id(key: &DuoPairKey, started_at: &DateTime<Utc>) -> String {
        let input = SeriesIdInput {
            teams: [key.low().tags(), key.high().tags()],
            start: duo_common::time::to_db_string(started_at),
        };
        // Serializing a struct of strings cannot fail
        let raw = serde_json::to_string(&input).unwrap_or_default();
        format!("{:x}", Sha256::digest(raw.as_bytes()))
    }

    /// Players in fixed order: side A first, side B second
    pub fn participants(&self) -> [&str; 4] {
        [
            self.team_a.first(),
            self.team_a.second(),
            self.team_b.first(),
            self.team_b.second(),
        ]
    }
}
