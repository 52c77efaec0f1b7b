//! Core services
//!
//! - [`match_normalizer`]: raw payload to canonical match, idempotent insert
//! - [`series_segmenter`]: best-of-7 detection over stored matches
//! - [`rating_engine`]: full rating recompute with a replaceable policy
//! - [`sync_orchestrator`]: one fetch, ingest, segment and rate cycle

pub mod match_normalizer;
pub mod rating_engine;
pub mod series_segmenter;
pub mod sync_orchestrator;

pub use match_normalizer::{IngestOutcome, MatchFilter, MatchNormalizer, Normalized, SkipReason};
pub use rating_engine::{
    rebuild_ratings, replay, FixedStep, PolicyKind, RatingPolicy, Recomputed, TeamLogisticElo,
};
pub use series_segmenter::{segment_matches, SeriesSegmenter};
pub use sync_orchestrator::{SyncOrchestrator, SyncReport};
