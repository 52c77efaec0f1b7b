//! Best-of-7 series segmentation
//!
//! Stored matches of the target mode are grouped by [`DuoPairKey`], split
//! into sessions on time gaps, and scanned for chunks where one side
//! reaches four decisive wins. A session may resolve several series back to
//! back; a trailing unresolved chunk stays unclaimed until a later run.

use crate::db::matches::{load_match_summaries, load_pair_matches_before};
use crate::db::series::{insert_series, series_exists};
use crate::error::SyncResult;
use crate::models::{DuoPairKey, MatchSummary, SeriesRecord, Side};
use chrono::{DateTime, Duration, Utc};
use duo_common::TrackerConfig;
use sqlx::SqliteConnection;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Decisive wins needed to clinch a best-of-7
pub const WINS_TO_CLINCH: u32 = 4;

/// Split one pair's matches (sorted by time) into sessions.
///
/// A new session starts whenever the gap to the previous match exceeds
/// `max_gap`; a gap of exactly `max_gap` continues the session.
pub fn split_sessions<'a>(matches: &'a [MatchSummary], max_gap: Duration) -> Vec<&'a [MatchSummary]> {
    let mut sessions = Vec::new();
    let mut start = 0;
    for i in 1..matches.len() {
        if matches[i].battle_time - matches[i - 1].battle_time > max_gap {
            sessions.push(&matches[start..i]);
            start = i;
        }
    }
    if start < matches.len() {
        sessions.push(&matches[start..]);
    }
    sessions
}

/// Resolve every series in one session.
///
/// **Algorithm:**
/// 1. Scan in order, counting decisive wins per side (draws count for neither)
/// 2. When a side reaches [`WINS_TO_CLINCH`], emit a series covering every
///    match since the last reset, draws included
/// 3. Reset both counters and keep scanning the same session
pub fn resolve_session(key: &DuoPairKey, session: &[MatchSummary]) -> Vec<SeriesRecord> {
    let mut resolved = Vec::new();
    let mut chunk_start = 0;
    let (mut wins_a, mut wins_b) = (0u32, 0u32);

    for (i, m) in session.iter().enumerate() {
        match m.winner.side() {
            Some(Side::A) => wins_a += 1,
            Some(Side::B) => wins_b += 1,
            None => {}
        }

        let winner = if wins_a == WINS_TO_CLINCH {
            Side::A
        } else if wins_b == WINS_TO_CLINCH {
            Side::B
        } else {
            continue;
        };

        let chunk = &session[chunk_start..=i];
        let first = &chunk[0];
        resolved.push(SeriesRecord {
            id: SeriesRecord::series_id(key, &first.battle_time),
            started_at: first.battle_time,
            ended_at: m.battle_time,
            mode_id: first.mode_id,
            team_a: first.team_a.clone(),
            team_b: first.team_b.clone(),
            winner,
            game_ids: chunk.iter().map(|g| g.id.clone()).collect(),
        });

        chunk_start = i + 1;
        wins_a = 0;
        wins_b = 0;
    }

    resolved
}

/// Group matches by pair, sort each group by (time, id) and resolve all sessions.
///
/// Output is ordered by pair key, then by start time.
pub fn segment_matches(matches: Vec<MatchSummary>, max_gap: Duration) -> Vec<SeriesRecord> {
    let mut grouped: BTreeMap<DuoPairKey, Vec<MatchSummary>> = BTreeMap::new();
    for m in matches {
        grouped.entry(m.pair_key()).or_default().push(m);
    }

    let mut series = Vec::new();
    for (key, mut group) in grouped {
        group.sort_by(|a, b| a.battle_time.cmp(&b.battle_time).then_with(|| a.id.cmp(&b.id)));
        for session in split_sessions(&group, max_gap) {
            series.extend(resolve_session(&key, session));
        }
    }
    series
}

/// Detects series from the match store and persists new ones
#[derive(Debug, Clone)]
pub struct SeriesSegmenter {
    mode_id: i64,
    max_gap: Duration,
}

impl SeriesSegmenter {
    pub fn new(mode_id: i64, max_gap: Duration) -> Self {
        Self { mode_id, max_gap }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(config.target_mode_id, config.session_max_gap())
    }

    /// Segment stored matches and insert series not seen before.
    ///
    /// With `since`, only pairs with a match at or after that instant are
    /// scanned (incremental runs). Each such pair is widened back to the
    /// start of the session holding its first windowed match, so chunk
    /// boundaries agree with a full run. Returns the newly inserted series in
    /// detection order.
    pub async fn detect(
        &self,
        conn: &mut SqliteConnection,
        since: Option<DateTime<Utc>>,
    ) -> SyncResult<Vec<SeriesRecord>> {
        let mut matches = load_match_summaries(&mut *conn, self.mode_id, since).await?;
        if since.is_some() {
            let earlier = self.session_heads(&mut *conn, &matches).await?;
            matches.extend(earlier);
        }
        let scanned = matches.len();
        let candidates = segment_matches(matches, self.max_gap);

        let mut inserted = Vec::new();
        for series in candidates {
            if series_exists(&mut *conn, &series.id).await? {
                continue;
            }
            if insert_series(&mut *conn, &series).await? {
                debug!(
                    series_id = %series.id,
                    team_a = %series.team_a,
                    team_b = %series.team_b,
                    winner = series.winner.code(),
                    games = series.game_ids.len(),
                    "Series resolved"
                );
                inserted.push(series);
            }
        }

        info!(
            matches = scanned,
            new_series = inserted.len(),
            windowed = since.is_some(),
            "Series detection complete"
        );
        Ok(inserted)
    }

    /// Earlier matches in the sessions that `window` cuts into.
    ///
    /// For each pair, walks back from its first windowed match until a gap
    /// exceeds `max_gap`. `window` must be sorted by (time, id).
    async fn session_heads(
        &self,
        conn: &mut SqliteConnection,
        window: &[MatchSummary],
    ) -> SyncResult<Vec<MatchSummary>> {
        let mut first_seen: BTreeMap<DuoPairKey, &MatchSummary> = BTreeMap::new();
        for m in window {
            first_seen.entry(m.pair_key()).or_insert(m);
        }

        let mut heads = Vec::new();
        for first in first_seen.into_values() {
            let history = load_pair_matches_before(
                &mut *conn,
                self.mode_id,
                &first.team_a,
                &first.team_b,
                first.battle_time,
            )
            .await?;

            let mut next = first.battle_time;
            for m in history {
                if next - m.battle_time > self.max_gap {
                    break;
                }
                next = m.battle_time;
                heads.push(m);
            }
        }
        Ok(heads)
    }
}
