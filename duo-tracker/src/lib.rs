//! duo-tracker library
//!
//! Ingests two-vs-two duo matches from the battle-log feed, segments them
//! into best-of-7 series and recomputes per-player ratings.

pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;

pub use error::{FeedError, IngestError, SyncError, SyncResult};
pub use feed::{BattleLogClient, MatchFeed};
pub use services::{MatchNormalizer, SeriesSegmenter, SyncOrchestrator, SyncReport};
