//! Test Helper Utilities
//!
//! Shared utilities for testing duo-tracker

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use duo_common::TrackerConfig;
use duo_tracker::{FeedError, MatchFeed};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::HashMap;
use tempfile::TempDir;

pub const MODE_ID: i64 = 72000051;
pub const TRACKED: [&str; 4] = ["#A1", "#A2", "#B1", "#B2"];

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = duo_common::db::init_database(&temp_dir.path().join("test_duo.db")).await?;
    Ok((temp_dir, pool))
}

/// Configuration tracking the four test players
pub fn test_config() -> TrackerConfig {
    TrackerConfig::with_defaults(
        "test-token",
        TRACKED.iter().map(|t| t.to_string()).collect(),
        vec!["Ann".into(), "Al".into(), "Bea".into(), "Bo".into()],
    )
}

/// Fixed reference time for match sequences
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 13, 20, 0, 0).unwrap()
}

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minute)
}

/// Raw battle-log payload as the feed reports it
pub fn battle_payload(
    team: [&str; 2],
    opponent: [&str; 2],
    crowns: (i64, i64),
    battle_time: DateTime<Utc>,
) -> Value {
    let side = |tags: [&str; 2], c: i64| {
        json!([
            { "tag": tags[0], "name": "p", "crowns": c, "elixirLeaked": 2.5,
              "cards": [{ "id": 26000000, "name": "Knight" }, { "id": 26000001 }] },
            { "tag": tags[1], "name": "q", "crowns": c,
              "cards": [{ "id": 26000002 }] }
        ])
    };
    json!({
        "type": "clanMate2v2",
        "battleTime": battle_time.format("%Y%m%dT%H%M%S%.3fZ").to_string(),
        "gameMode": { "id": MODE_ID, "name": "Touchdown_Draft" },
        "eventTag": "td-draft",
        "team": side(team, crowns.0),
        "opponent": side(opponent, crowns.1),
    })
}

/// Payload between the standard duos; `a_wins` picks the winning side
pub fn duo_game(minute: i64, a_wins: bool) -> Value {
    let crowns = if a_wins { (3, 1) } else { (0, 2) };
    battle_payload(["#A1", "#A2"], ["#B1", "#B2"], crowns, at_minute(minute))
}

/// Feed returning canned payloads; unknown players fail
#[derive(Default)]
pub struct StubFeed {
    responses: HashMap<String, Vec<Value>>,
}

impl StubFeed {
    pub fn with(mut self, tag: &str, payloads: Vec<Value>) -> Self {
        self.responses.insert(tag.to_string(), payloads);
        self
    }
}

#[async_trait]
impl MatchFeed for StubFeed {
    async fn recent_matches(&self, player_tag: &str) -> Result<Vec<Value>, FeedError> {
        self.responses
            .get(player_tag)
            .cloned()
            .ok_or_else(|| FeedError::Decode(format!("no canned response for {}", player_tag)))
    }
}
