//! Sync cycle orchestrator
//!
//! One cycle:
//! 1. Seed configured players
//! 2. For each tracked player, fetch recent matches and ingest them in one
//!    transaction (a fetch failure skips that player only)
//! 3. Detect series over the configured window
//! 4. Rebuild ratings, only when at least one new match was stored

use crate::db::players::seed_players;
use crate::error::SyncResult;
use crate::feed::MatchFeed;
use crate::services::match_normalizer::{IngestOutcome, MatchNormalizer};
use crate::services::rating_engine::{rebuild_ratings, RatingPolicy, TeamLogisticElo};
use crate::services::series_segmenter::SeriesSegmenter;
use chrono::{DateTime, Duration, Utc};
use duo_common::TrackerConfig;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Counters for one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub new_matches: usize,
    pub duplicate_matches: usize,
    /// Well-formed payloads outside the tracked scope
    pub skipped_payloads: usize,
    /// Malformed payloads (bad timestamp, missing field)
    pub rejected_payloads: usize,
    /// Players whose fetch failed this cycle
    pub failed_players: Vec<String>,
    pub new_series: usize,
    /// Rating rows written; `None` when the rebuild was skipped
    pub rating_rows: Option<usize>,
}

pub struct SyncOrchestrator {
    db: SqlitePool,
    config: TrackerConfig,
    normalizer: MatchNormalizer,
    segmenter: SeriesSegmenter,
    policy: Box<dyn RatingPolicy>,
}

impl SyncOrchestrator {
    pub fn new(db: SqlitePool, config: TrackerConfig) -> Self {
        Self::with_policy(db, config, Box::new(TeamLogisticElo))
    }

    pub fn with_policy(db: SqlitePool, config: TrackerConfig, policy: Box<dyn RatingPolicy>) -> Self {
        let normalizer = MatchNormalizer::from_config(&config);
        let segmenter = SeriesSegmenter::from_config(&config);
        Self {
            db,
            config,
            normalizer,
            segmenter,
            policy,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Series detection window for incremental runs
    pub fn default_window(&self) -> Option<Duration> {
        (self.config.series_window_hours > 0).then(|| Duration::hours(self.config.series_window_hours))
    }

    /// Upsert configured players and their names
    pub async fn seed_players(&self) -> SyncResult<u64> {
        let mut conn = self.db.acquire().await?;
        let changed = seed_players(&mut conn, self.config.tracked_players()).await?;
        if changed > 0 {
            info!(changed, "Seeded tracked players");
        }
        Ok(changed)
    }

    /// Run one full cycle against `feed`.
    ///
    /// `window` bounds series detection to recent matches; `None` scans all.
    pub async fn sync_once(&self, feed: &dyn MatchFeed, window: Option<Duration>) -> SyncResult<SyncReport> {
        let mut report = SyncReport::default();

        self.seed_players().await?;

        for tag in &self.config.player_tags {
            let payloads = match feed.recent_matches(tag).await {
                Ok(payloads) => payloads,
                Err(e) => {
                    warn!(player = %tag, error = %e, "Fetch failed, skipping player this cycle");
                    report.failed_players.push(tag.clone());
                    continue;
                }
            };
            self.ingest_batch(tag, &payloads, &mut report).await?;
        }

        let since = window.map(|w| duo_common::time::now() - w);
        report.new_series = self.detect_series(since).await?;

        if report.new_matches > 0 {
            report.rating_rows = Some(self.recompute_ratings().await?);
        } else {
            info!("No new matches, rating rebuild skipped");
        }

        info!(
            new_matches = report.new_matches,
            duplicates = report.duplicate_matches,
            skipped = report.skipped_payloads,
            rejected = report.rejected_payloads,
            failed_players = report.failed_players.len(),
            new_series = report.new_series,
            "Sync cycle complete"
        );
        Ok(report)
    }

    /// Ingest one player's payloads, committing once at the end.
    ///
    /// A database error returns early; the dropped transaction rolls back.
    async fn ingest_batch(
        &self,
        tag: &str,
        payloads: &[serde_json::Value],
        report: &mut SyncReport,
    ) -> SyncResult<()> {
        let mut tx = self.db.begin().await?;
        let mut inserted = 0;

        for payload in payloads {
            match self.normalizer.ingest(&mut *tx, payload).await {
                Ok(IngestOutcome::Inserted(_)) => inserted += 1,
                Ok(IngestOutcome::Duplicate(_)) => report.duplicate_matches += 1,
                Ok(IngestOutcome::Skipped(_)) => report.skipped_payloads += 1,
                Err(e) if e.is_payload_error() => {
                    warn!(player = %tag, error = %e, "Rejected malformed payload");
                    report.rejected_payloads += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;
        report.new_matches += inserted;
        info!(player = %tag, fetched = payloads.len(), inserted, "Player batch committed");
        Ok(())
    }

    /// Detect and store new series; returns how many were inserted
    pub async fn detect_series(&self, since: Option<DateTime<Utc>>) -> SyncResult<usize> {
        let mut tx = self.db.begin().await?;
        let inserted = self.segmenter.detect(&mut *tx, since).await?;
        tx.commit().await?;
        Ok(inserted.len())
    }

    /// Rebuild the rating history with the configured policy
    pub async fn recompute_ratings(&self) -> SyncResult<usize> {
        rebuild_ratings(&self.db, self.policy.as_ref()).await
    }
}
