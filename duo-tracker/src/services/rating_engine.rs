//! Rating recompute
//!
//! Ratings are derived data. Every recompute clears the history and replays
//! all series in (ended_at, started_at, id) order from an empty state.
//! The engine owns initialization, counters and snapshots; a
//! [`RatingPolicy`] only decides the per-series deltas.

use crate::db::ratings::{clear_rating_history, insert_snapshots};
use crate::db::series::load_series_ordered;
use crate::error::SyncResult;
use crate::models::{PlayerRating, RatingSnapshot, SeriesRecord, Side};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::info;

/// Rating every player starts from
pub const START_RATING: f64 = 400.0;

/// Logistic scale: a gap of this many points gives 10:1 odds
pub const LOGISTIC_SCALE: f64 = 500.0;

/// Maximum learning rate (a player with no series)
pub const BASE_K: f64 = 50.0;

/// Series count at which the learning rate has halved
pub const K_DECAY_SERIES: f64 = 60.0;

/// Rating change rule applied once per series
pub trait RatingPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rating of a player seen for the first time
    fn start_rating(&self) -> f64 {
        START_RATING
    }

    /// Deltas for the four participants, in [`SeriesRecord::participants`]
    /// order (side A first). `ratings` are the values before this series.
    fn deltas(&self, ratings: [PlayerRating; 4], winner: Side) -> [f64; 4];
}

/// Logistic team Elo with an experience-decayed learning rate
///
/// A player's expectation is the mean of the two one-on-one logistic
/// expectations against the opponents; a side's expectation is the mean of
/// its two players'. Each side's expectation is computed from its own
/// ratings, never derived as the complement of the other side's.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeamLogisticElo;

impl TeamLogisticElo {
    /// One-on-one expectation of `player` against `opponent`
    pub fn expected(player: f64, opponent: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent - player) / LOGISTIC_SCALE))
    }

    /// Expectation of one player against both opponents
    pub fn expected_vs_pair(player: f64, opponents: [f64; 2]) -> f64 {
        (Self::expected(player, opponents[0]) + Self::expected(player, opponents[1])) / 2.0
    }

    /// Mean expectation of a side
    pub fn team_expectation(team: [f64; 2], opponents: [f64; 2]) -> f64 {
        (Self::expected_vs_pair(team[0], opponents) + Self::expected_vs_pair(team[1], opponents))
            / 2.0
    }

    /// Learning rate after `series_played` decisive series
    pub fn k_factor(series_played: u32) -> f64 {
        BASE_K / (1.0 + f64::from(series_played) / K_DECAY_SERIES)
    }
}

impl RatingPolicy for TeamLogisticElo {
    fn name(&self) -> &'static str {
        "logistic"
    }

    fn deltas(&self, ratings: [PlayerRating; 4], winner: Side) -> [f64; 4] {
        let team_a = [ratings[0].rating, ratings[1].rating];
        let team_b = [ratings[2].rating, ratings[3].rating];
        let expected_a = Self::team_expectation(team_a, team_b);
        let expected_b = Self::team_expectation(team_b, team_a);
        let (score_a, score_b) = match winner {
            Side::A => (1.0, 0.0),
            Side::B => (0.0, 1.0),
        };

        let mut deltas = [0.0; 4];
        for (i, player) in ratings.iter().enumerate() {
            let (score, expected) = if i < 2 {
                (score_a, expected_a)
            } else {
                (score_b, expected_b)
            };
            deltas[i] = Self::k_factor(player.series_played) * (score - expected);
        }
        deltas
    }
}

/// Flat win/loss step, independent of ratings and experience
#[derive(Debug, Clone, Copy)]
pub struct FixedStep {
    pub win_step: f64,
    pub loss_step: f64,
}

impl Default for FixedStep {
    fn default() -> Self {
        Self {
            win_step: 10.0,
            loss_step: 10.0,
        }
    }
}

impl RatingPolicy for FixedStep {
    fn name(&self) -> &'static str {
        "fixed-step"
    }

    fn deltas(&self, _ratings: [PlayerRating; 4], winner: Side) -> [f64; 4] {
        let (a, b) = match winner {
            Side::A => (self.win_step, -self.loss_step),
            Side::B => (-self.loss_step, self.win_step),
        };
        [a, a, b, b]
    }
}

/// Policy selectable from the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
    #[default]
    Logistic,
    FixedStep,
}

impl PolicyKind {
    pub fn build(self) -> Box<dyn RatingPolicy> {
        match self {
            PolicyKind::Logistic => Box::new(TeamLogisticElo),
            PolicyKind::FixedStep => Box::new(FixedStep::default()),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logistic" | "elo" => Ok(PolicyKind::Logistic),
            "fixed-step" | "fixed" => Ok(PolicyKind::FixedStep),
            other => Err(format!(
                "unknown rating policy {:?} (expected logistic or fixed-step)",
                other
            )),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyKind::Logistic => f.write_str("logistic"),
            PolicyKind::FixedStep => f.write_str("fixed-step"),
        }
    }
}

/// Final state of a recompute pass
#[derive(Debug, Clone, Default)]
pub struct Recomputed {
    /// Snapshots in append order, four per series
    pub snapshots: Vec<RatingSnapshot>,
    /// Unrounded end state per player
    pub ratings: HashMap<String, PlayerRating>,
}

/// Replay `series` (already in rating order) under `policy`.
///
/// **Algorithm:**
/// 1. Initialize each player at the policy's start rating on first sight
/// 2. Ask the policy for the four deltas using pre-series values
/// 3. Apply the deltas, then increment each player's series count
/// 4. Append one rounded snapshot per player at the series end time
pub fn replay(series: &[SeriesRecord], policy: &dyn RatingPolicy) -> Recomputed {
    let mut ratings: HashMap<String, PlayerRating> = HashMap::new();
    let mut snapshots = Vec::with_capacity(series.len() * 4);

    for s in series {
        let tags = s.participants();
        let before = tags.map(|tag| {
            *ratings
                .entry(tag.to_string())
                .or_insert_with(|| PlayerRating::new(policy.start_rating()))
        });

        let deltas = policy.deltas(before, s.winner);

        for (i, tag) in tags.iter().enumerate() {
            let state = PlayerRating {
                rating: before[i].rating + deltas[i],
                series_played: before[i].series_played + 1,
            };
            ratings.insert(tag.to_string(), state);
            snapshots.push(RatingSnapshot {
                player_tag: tag.to_string(),
                timestamp: s.ended_at,
                rating: state.rating.round() as i64,
            });
        }
    }

    Recomputed { snapshots, ratings }
}

/// Rebuild the stored rating history from the series store.
///
/// Clear and rewrite happen in one transaction. Returns the number of
/// snapshot rows written.
pub async fn rebuild_ratings(pool: &SqlitePool, policy: &dyn RatingPolicy) -> SyncResult<usize> {
    let mut tx = pool.begin().await?;

    let series = load_series_ordered(&mut *tx).await?;
    let recomputed = replay(&series, policy);

    let cleared = clear_rating_history(&mut *tx).await?;
    insert_snapshots(&mut *tx, &recomputed.snapshots).await?;
    tx.commit().await?;

    info!(
        policy = policy.name(),
        series = series.len(),
        players = recomputed.ratings.len(),
        cleared,
        inserted = recomputed.snapshots.len(),
        "Rating history rebuilt"
    );
    Ok(recomputed.snapshots.len())
}
