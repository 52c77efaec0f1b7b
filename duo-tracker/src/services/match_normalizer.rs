//! Match normalization and idempotent ingest
//!
//! Turns one raw feed payload into a canonical [`MatchRecord`]:
//! 1. Decode the payload (structure errors reject this payload only)
//! 2. Filter: duo type, target mode, exactly 2v2, clan, tracked players
//! 3. Canonicalize sides so that side A is the smaller duo
//! 4. Content-hash id; an id already stored is a no-op

use crate::db::matches::{insert_match, match_exists};
use crate::error::IngestError;
use crate::models::{Duo, MatchRecord, ParticipantStats, RawBattle, RawParticipant, Side, Winner};
use duo_common::config::normalize_tag;
use duo_common::TrackerConfig;
use sha2::{Digest, Sha256};
use sqlx::SqliteConnection;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Why an otherwise well-formed payload is out of scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MatchType(Option<String>),
    Mode(Option<i64>),
    NotTwoVsTwo { team: usize, opponent: usize },
    ForeignClan(Option<String>),
    UntrackedPlayer(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MatchType(t) => write!(f, "match type {:?} not tracked", t),
            SkipReason::Mode(m) => write!(f, "game mode {:?} not tracked", m),
            SkipReason::NotTwoVsTwo { team, opponent } => {
                write!(f, "not 2v2 ({} vs {} participants)", team, opponent)
            }
            SkipReason::ForeignClan(c) => write!(f, "participant clan {:?} not allowed", c),
            SkipReason::UntrackedPlayer(tag) => write!(f, "untracked player {}", tag),
        }
    }
}

/// Result of normalizing one decoded payload
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    Record(MatchRecord),
    Skipped(SkipReason),
}

/// Result of ingesting one payload
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// New match stored under this id
    Inserted(String),
    /// Match id already stored; nothing written
    Duplicate(String),
    Skipped(SkipReason),
}

impl IngestOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, IngestOutcome::Inserted(_))
    }
}

/// Acceptance rules for raw payloads
#[derive(Debug, Clone)]
pub struct MatchFilter {
    pub match_types: HashSet<String>,
    pub target_mode_id: i64,
    pub clan_tag: Option<String>,
    pub tracked_tags: HashSet<String>,
}

impl MatchFilter {
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            match_types: config.duo_match_types.iter().cloned().collect(),
            target_mode_id: config.target_mode_id,
            clan_tag: config.clan_tag.clone(),
            tracked_tags: config.tracked_tags(),
        }
    }

    /// Checks that need no participant tags
    fn check_shape(&self, battle: &RawBattle) -> Option<SkipReason> {
        match battle.battle_type.as_deref() {
            Some(t) if self.match_types.contains(t) => {}
            other => return Some(SkipReason::MatchType(other.map(str::to_string))),
        }
        if battle.mode_id() != Some(self.target_mode_id) {
            return Some(SkipReason::Mode(battle.mode_id()));
        }
        if battle.team.len() != 2 || battle.opponent.len() != 2 {
            return Some(SkipReason::NotTwoVsTwo {
                team: battle.team.len(),
                opponent: battle.opponent.len(),
            });
        }
        if let Some(clan) = &self.clan_tag {
            for p in battle.participants() {
                let tag = p.clan_tag().map(normalize_tag);
                if tag.as_deref() != Some(clan.as_str()) {
                    return Some(SkipReason::ForeignClan(tag));
                }
            }
        }
        None
    }
}

/// Stateless normalizer over a fixed filter
#[derive(Debug, Clone)]
pub struct MatchNormalizer {
    filter: MatchFilter,
}

impl MatchNormalizer {
    pub fn new(filter: MatchFilter) -> Self {
        Self { filter }
    }

    pub fn from_config(config: &TrackerConfig) -> Self {
        Self::new(MatchFilter::from_config(config))
    }

    /// Normalize a decoded payload.
    ///
    /// Filtering happens before validation: an out-of-scope payload is
    /// skipped even when it would also be malformed.
    pub fn normalize(&self, battle: &RawBattle) -> Result<Normalized, IngestError> {
        if let Some(reason) = self.filter.check_shape(battle) {
            return Ok(Normalized::Skipped(reason));
        }

        let team_tags = side_tags(&battle.team)?;
        let opponent_tags = side_tags(&battle.opponent)?;
        if let Some(outsider) = team_tags
            .iter()
            .chain(opponent_tags.iter())
            .find(|tag| !self.filter.tracked_tags.contains(*tag))
        {
            return Ok(Normalized::Skipped(SkipReason::UntrackedPlayer(outsider.clone())));
        }

        let raw_time = battle
            .battle_time
            .as_deref()
            .ok_or(IngestError::MissingField("battleTime"))?;
        let battle_time = duo_common::time::parse_feed_time(raw_time).map_err(|source| {
            IngestError::InvalidTimestamp {
                value: raw_time.to_string(),
                source,
            }
        })?;

        let match_type = battle.battle_type.clone().unwrap_or_default();
        let mode_id = self.filter.target_mode_id;
        let id = match_id(&match_type, raw_time, mode_id, &team_tags, &opponent_tags);

        let team = Duo::new(team_tags[0].clone(), team_tags[1].clone());
        let opponent = Duo::new(opponent_tags[0].clone(), opponent_tags[1].clone());
        let team_crowns = side_crowns(&battle.team);
        let opponent_crowns = side_crowns(&battle.opponent);
        let winner = Winner::from_crowns(team_crowns, opponent_crowns);

        // Feed's `team` is side A unless its duo sorts after the opponent's
        let swapped = opponent < team;
        let (team_side, opponent_side) = if swapped {
            (Side::B, Side::A)
        } else {
            (Side::A, Side::B)
        };

        let mut participants = Vec::with_capacity(4);
        for (side, players) in [(team_side, &battle.team), (opponent_side, &battle.opponent)] {
            for p in players {
                participants.push(participant_stats(p, side)?);
            }
        }

        let record = if swapped {
            MatchRecord {
                id,
                battle_time,
                match_type,
                mode_id,
                event_tag: battle.event_tag.clone(),
                team_a: opponent,
                team_b: team,
                team_a_crowns: opponent_crowns,
                team_b_crowns: team_crowns,
                winner: winner.flipped(),
                participants,
            }
        } else {
            MatchRecord {
                id,
                battle_time,
                match_type,
                mode_id,
                event_tag: battle.event_tag.clone(),
                team_a: team,
                team_b: opponent,
                team_a_crowns: team_crowns,
                team_b_crowns: opponent_crowns,
                winner,
                participants,
            }
        };

        Ok(Normalized::Record(record))
    }

    /// Decode, normalize and store one raw payload.
    ///
    /// The caller owns the transaction; on a database error it must roll back.
    pub async fn ingest(
        &self,
        conn: &mut SqliteConnection,
        payload: &serde_json::Value,
    ) -> Result<IngestOutcome, IngestError> {
        let battle = RawBattle::deserialize_payload(payload)?;

        let record = match self.normalize(&battle)? {
            Normalized::Record(record) => record,
            Normalized::Skipped(reason) => {
                debug!(reason = %reason, "Skipping payload");
                return Ok(IngestOutcome::Skipped(reason));
            }
        };

        if match_exists(&mut *conn, &record.id).await? {
            debug!(match_id = %record.id, "Match already stored");
            return Ok(IngestOutcome::Duplicate(record.id));
        }

        insert_match(&mut *conn, &record).await?;
        debug!(
            match_id = %record.id,
            team_a = %record.team_a,
            team_b = %record.team_b,
            winner = record.winner.code(),
            "Stored new match"
        );

        Ok(IngestOutcome::Inserted(record.id))
    }
}

/// Content hash of (type, raw battle time, mode id, sorted participant tags)
pub fn match_id(
    match_type: &str,
    raw_battle_time: &str,
    mode_id: i64,
    team_tags: &[String],
    opponent_tags: &[String],
) -> String {
    let mut tags: Vec<&str> = team_tags
        .iter()
        .chain(opponent_tags.iter())
        .map(String::as_str)
        .collect();
    tags.sort_unstable();

    let mut parts = vec![match_type.to_string(), raw_battle_time.to_string(), mode_id.to_string()];
    parts.extend(tags.into_iter().map(str::to_string));
    let raw = parts.join("|");

    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

fn side_tags(players: &[RawParticipant]) -> Result<Vec<String>, IngestError> {
    players
        .iter()
        .map(|p| {
            p.tag
                .as_deref()
                .map(normalize_tag)
                .filter(|t| !t.is_empty())
                .ok_or(IngestError::MissingField("tag"))
        })
        .collect()
}

/// Every participant carries the side total; the first one is authoritative
fn side_crowns(players: &[RawParticipant]) -> i64 {
    players.first().and_then(|p| p.crowns).unwrap_or(0)
}

fn participant_stats(p: &RawParticipant, side: Side) -> Result<ParticipantStats, IngestError> {
    let card_ids = p
        .cards
        .iter()
        .map(|c| c.id.ok_or(IngestError::MissingField("cards.id")))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParticipantStats {
        tag: p
            .tag
            .as_deref()
            .map(normalize_tag)
            .ok_or(IngestError::MissingField("tag"))?,
        side,
        crowns: p.crowns.unwrap_or(0),
        elixir_leaked: p.elixir_leaked.unwrap_or(0.0),
        card_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filter() -> MatchFilter {
        MatchFilter {
            match_types: ["clanMate2v2".to_string()].into_iter().collect(),
            target_mode_id: 72000051,
            clan_tag: None,
            tracked_tags: ["#A1", "#A2", "#B1", "#B2"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    fn battle(team: [&str; 2], opponent: [&str; 2], crowns: (i64, i64)) -> RawBattle {
        let side = |tags: [&str; 2], c: i64| {
            json!([
                { "tag": tags[0], "crowns": c, "elixirLeaked": 1.25, "cards": [{ "id": 1 }] },
                { "tag": tags[1], "crowns": c, "cards": [{ "id": 2 }, { "id": 3 }] }
            ])
        };
        serde_json::from_value(json!({
            "type": "clanMate2v2",
            "battleTime": "20251013T200000.000Z",
            "gameMode": { "id": 72000051 },
            "team": side(team, crowns.0),
            "opponent": side(opponent, crowns.1),
        }))
        .unwrap()
    }

    fn record(normalized: Normalized) -> MatchRecord {
        match normalized {
            Normalized::Record(r) => r,
            Normalized::Skipped(reason) => panic!("unexpected skip: {}", reason),
        }
    }

    #[test]
    fn test_canonical_order_without_swap() {
        let normalizer = MatchNormalizer::new(filter());
        let r = record(normalizer.normalize(&battle(["#A2", "#A1"], ["#B1", "#B2"], (3, 1))).unwrap());

        assert_eq!(r.team_a, Duo::new("#A1", "#A2"));
        assert_eq!(r.team_b, Duo::new("#B1", "#B2"));
        assert_eq!((r.team_a_crowns, r.team_b_crowns), (3, 1));
        assert_eq!(r.winner, Winner::A);
        assert_eq!(r.participants.len(), 4);
        assert!(r.participants[..2].iter().all(|p| p.side == Side::A));
        assert_eq!(r.participants[0].elixir_leaked, 1.25);
        assert_eq!(r.participants[1].elixir_leaked, 0.0);
        assert_eq!(r.participants[1].card_ids, vec![2, 3]);
    }

    #[test]
    fn test_swapped_sides_flip_crowns_and_winner() {
        let normalizer = MatchNormalizer::new(filter());
        let straight =
            record(normalizer.normalize(&battle(["#A1", "#A2"], ["#B1", "#B2"], (3, 1))).unwrap());
        let swapped =
            record(normalizer.normalize(&battle(["#B1", "#B2"], ["#A1", "#A2"], (1, 3))).unwrap());

        assert_eq!(swapped.team_a, straight.team_a);
        assert_eq!(swapped.team_b, straight.team_b);
        assert_eq!(swapped.team_a_crowns, 3);
        assert_eq!(swapped.team_b_crowns, 1);
        assert_eq!(swapped.winner, Winner::A);
        assert_eq!(swapped.id, straight.id);

        let b1 = swapped.participants.iter().find(|p| p.tag == "#B1").unwrap();
        assert_eq!(b1.side, Side::B);
        assert_eq!(b1.crowns, 1);
    }

    #[test]
    fn test_draw_is_kept() {
        let normalizer = MatchNormalizer::new(filter());
        let r = record(normalizer.normalize(&battle(["#B1", "#B2"], ["#A1", "#A2"], (2, 2))).unwrap());
        assert_eq!(r.winner, Winner::Draw);
    }

    #[test]
    fn test_tags_are_normalized() {
        let normalizer = MatchNormalizer::new(filter());
        let r = record(normalizer.normalize(&battle([" #a1", "#A2 "], ["#b1", "#B2"], (1, 0))).unwrap());
        assert_eq!(r.team_a, Duo::new("#A1", "#A2"));
    }

    #[test]
    fn test_filter_rejections() {
        let normalizer = MatchNormalizer::new(filter());

        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.battle_type = Some("PvP".to_string());
        assert!(matches!(
            normalizer.normalize(&b).unwrap(),
            Normalized::Skipped(SkipReason::MatchType(_))
        ));

        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.game_mode = None;
        assert_eq!(
            normalizer.normalize(&b).unwrap(),
            Normalized::Skipped(SkipReason::Mode(None))
        );

        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.opponent.pop();
        assert_eq!(
            normalizer.normalize(&b).unwrap(),
            Normalized::Skipped(SkipReason::NotTwoVsTwo { team: 2, opponent: 1 })
        );

        let b = battle(["#A1", "#A2"], ["#B1", "#XX"], (1, 0));
        assert_eq!(
            normalizer.normalize(&b).unwrap(),
            Normalized::Skipped(SkipReason::UntrackedPlayer("#XX".to_string()))
        );
    }

    #[test]
    fn test_clan_restriction() {
        let mut f = filter();
        f.clan_tag = Some("#CLAN".to_string());
        let normalizer = MatchNormalizer::new(f);

        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        assert!(matches!(
            normalizer.normalize(&b).unwrap(),
            Normalized::Skipped(SkipReason::ForeignClan(None))
        ));

        for p in b.team.iter_mut().chain(b.opponent.iter_mut()) {
            p.clan = Some(crate::models::RawClan {
                tag: Some("#clan".to_string()),
                name: None,
            });
        }
        assert!(matches!(normalizer.normalize(&b).unwrap(), Normalized::Record(_)));
    }

    #[test]
    fn test_invalid_timestamp_is_error() {
        let normalizer = MatchNormalizer::new(filter());
        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.battle_time = Some("2025-10-13 20:00".to_string());
        let err = normalizer.normalize(&b).unwrap_err();
        assert!(matches!(err, IngestError::InvalidTimestamp { .. }));
        assert!(err.is_payload_error());

        b.battle_time = None;
        assert!(matches!(
            normalizer.normalize(&b).unwrap_err(),
            IngestError::MissingField("battleTime")
        ));
    }

    #[test]
    fn test_missing_tag_and_card_id() {
        let normalizer = MatchNormalizer::new(filter());
        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.team[0].tag = None;
        assert!(matches!(
            normalizer.normalize(&b).unwrap_err(),
            IngestError::MissingField("tag")
        ));

        let mut b = battle(["#A1", "#A2"], ["#B1", "#B2"], (1, 0));
        b.team[0].cards[0].id = None;
        assert!(matches!(
            normalizer.normalize(&b).unwrap_err(),
            IngestError::MissingField("cards.id")
        ));
    }

    #[test]
    fn test_match_id_ignores_side_order() {
        let a = ["#A1".to_string(), "#A2".to_string()];
        let b = ["#B1".to_string(), "#B2".to_string()];
        let id = match_id("clanMate2v2", "20251013T200000.000Z", 72000051, &a, &b);
        assert_eq!(id, match_id("clanMate2v2", "20251013T200000.000Z", 72000051, &b, &a));
        assert_ne!(id, match_id("clanMate2v2", "20251013T200001.000Z", 72000051, &a, &b));
        assert_eq!(id.len(), 64);
    }
}
