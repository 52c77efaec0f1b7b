//! Store functions for duo-tracker
//!
//! Every function takes a `&mut SqliteConnection`; callers pass either a
//! pooled connection or `&mut *tx` and decide where the batch commits.

pub mod matches;
pub mod players;
pub mod ratings;
pub mod series;

use crate::error::SyncError;
use chrono::{DateTime, Utc};

/// Parse a stored timestamp column
pub(crate) fn parse_stored_time(raw: &str, column: &str) -> Result<DateTime<Utc>, SyncError> {
    duo_common::time::from_db_string(raw)
        .map_err(|e| SyncError::CorruptData(format!("{} {:?}: {}", column, raw, e)))
}
