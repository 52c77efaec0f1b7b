//! Rating state and stored history

use chrono::{DateTime, Utc};

/// Rating of one player while a recompute pass is running
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRating {
    /// Unrounded rating value
    pub rating: f64,
    /// Decisive series played before the one being processed
    pub series_played: u32,
}

impl PlayerRating {
    pub fn new(rating: f64) -> Self {
        Self {
            rating,
            series_played: 0,
        }
    }
}

/// One row of the rating history, written at a series' end time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingSnapshot {
    pub player_tag: String,
    pub timestamp: DateTime<Utc>,
    /// Rating rounded to the nearest integer
    pub rating: i64,
}
