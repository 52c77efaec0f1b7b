//! Canonical match records
//!
//! A match is stored with its two duos in canonical order: side A is always
//! the lexicographically smaller duo, regardless of which side the upstream
//! payload reported first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical side of a match or series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// Single-letter storage code
    pub fn code(self) -> &'static str {
        match self {
            Side::A => "A",
            Side::B => "B",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Side::A),
            "B" => Some(Side::B),
            _ => None,
        }
    }
}

/// Outcome of a single match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    A,
    B,
    Draw,
}

impl Winner {
    /// Decide the winner from each side's crowns
    pub fn from_crowns(a: i64, b: i64) -> Self {
        match a.cmp(&b) {
            std::cmp::Ordering::Greater => Winner::A,
            std::cmp::Ordering::Less => Winner::B,
            std::cmp::Ordering::Equal => Winner::Draw,
        }
    }

    /// Winner after the two sides have been swapped
    pub fn flipped(self) -> Self {
        match self {
            Winner::A => Winner::B,
            Winner::B => Winner::A,
            Winner::Draw => Winner::Draw,
        }
    }

    /// Winning side, `None` for a draw
    pub fn side(self) -> Option<Side> {
        match self {
            Winner::A => Some(Side::A),
            Winner::B => Some(Side::B),
            Winner::Draw => None,
        }
    }

    /// Storage code: `A`, `B` or `D`
    pub fn code(self) -> &'static str {
        match self {
            Winner::A => "A",
            Winner::B => "B",
            Winner::Draw => "D",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Winner::A),
            "B" => Some(Winner::B),
            "D" => Some(Winner::Draw),
            _ => None,
        }
    }
}

/// Two players playing together as one side, stored sorted
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duo {
    first: String,
    second: String,
}

impl Duo {
    /// Build a duo; the two tags are sorted so that order of arrival is irrelevant
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if b < a {
            Self { first: b, second: a }
        } else {
            Self { first: a, second: b }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn tags(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }
}

impl fmt::Display for Duo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}", self.first, self.second)
    }
}

/// Order-independent identity of "this duo vs that duo"
///
/// Derived from a match, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DuoPairKey {
    low: Duo,
    high: Duo,
}

impl DuoPairKey {
    pub fn new(x: Duo, y: Duo) -> Self {
        if y < x {
            Self { low: y, high: x }
        } else {
            Self { low: x, high: y }
        }
    }

    pub fn low(&self) -> &Duo {
        &self.low
    }

    pub fn high(&self) -> &Duo {
        &self.high
    }
}

impl fmt::Display for DuoPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.low, self.high)
    }
}

/// Per-participant contribution to a match
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantStats {
    pub tag: String,
    pub side: Side,
    pub crowns: i64,
    pub elixir_leaked: f64,
    pub card_ids: Vec<i64>,
}

/// One completed, canonicalized game
///
/// Immutable once created; `team_a <= team_b` always holds.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    /// Content hash of (type, raw battle time, mode id, sorted participant tags)
    pub id: String,
    pub battle_time: DateTime<Utc>,
    pub match_type: String,
    pub mode_id: i64,
    pub event_tag: Option<String>,
    pub team_a: Duo,
    pub team_b: Duo,
    pub team_a_crowns: i64,
    pub team_b_crowns: i64,
    pub winner: Winner,
    pub participants: Vec<ParticipantStats>,
}

/// The part of a stored match the segmenter needs
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub id: String,
    pub battle_time: DateTime<Utc>,
    pub mode_id: i64,
    pub team_a: Duo,
    pub team_b: Duo,
    pub winner: Winner,
}

impl MatchSummary {
    pub fn pair_key(&self) -> DuoPairKey {
        DuoPairKey::new(self.team_a.clone(), self.team_b.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duo_is_sorted() {
        let duo = Duo::new("#ZED", "#ABE");
        assert_eq!(duo.first(), "#ABE");
        assert_eq!(duo.second(), "#ZED");
        assert_eq!(duo, Duo::new("#ABE", "#ZED"));
        assert_eq!(duo.tags(), ["#ABE", "#ZED"]);
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        let x = Duo::new("#C", "#D");
        let y = Duo::new("#B", "#A");
        let k1 = DuoPairKey::new(x.clone(), y.clone());
        let k2 = DuoPairKey::new(y, x);
        assert_eq!(k1, k2);
        assert_eq!(k1.low(), &Duo::new("#A", "#B"));
        assert_eq!(k1.to_string(), "#A+#B vs #C+#D");
    }

    #[test]
    fn test_winner_from_crowns_and_flip() {
        assert_eq!(Winner::from_crowns(3, 1), Winner::A);
        assert_eq!(Winner::from_crowns(0, 2), Winner::B);
        assert_eq!(Winner::from_crowns(1, 1), Winner::Draw);
        assert_eq!(Winner::A.flipped(), Winner::B);
        assert_eq!(Winner::Draw.flipped(), Winner::Draw);
        assert_eq!(Winner::B.side(), Some(Side::B));
        assert_eq!(Winner::Draw.side(), None);
    }

    #[test]
    fn test_codes() {
        for w in [Winner::A, Winner::B, Winner::Draw] {
            assert_eq!(Winner::from_code(w.code()), Some(w));
        }
        for s in [Side::A, Side::B] {
            assert_eq!(Side::from_code(s.code()), Some(s));
        }
        assert_eq!(Winner::from_code("X"), None);
    }
}
