//! Integration tests for the rating rebuild

mod helpers;

use chrono::Duration;
use duo_tracker::db::ratings::{insert_snapshots, latest_ratings, load_rating_history};
use duo_tracker::models::RatingSnapshot;
use duo_tracker::services::{rebuild_ratings, FixedStep, MatchNormalizer, SeriesSegmenter, TeamLogisticElo};
use helpers::*;
use sqlx::SqlitePool;

/// Store two sessions: A sweeps the first series, B wins the second
async fn seed_series(pool: &SqlitePool) {
    let normalizer = MatchNormalizer::from_config(&test_config());
    let mut tx = pool.begin().await.unwrap();
    for minute in [0, 5, 10, 15] {
        normalizer.ingest(&mut *tx, &duo_game(minute, true)).await.unwrap();
    }
    for minute in [120, 125, 130, 135, 140] {
        normalizer.ingest(&mut *tx, &duo_game(minute, minute == 125)).await.unwrap();
    }
    let segmenter = SeriesSegmenter::new(MODE_ID, Duration::minutes(30));
    assert_eq!(segmenter.detect(&mut *tx, None).await.unwrap().len(), 2);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_rebuild_writes_four_snapshots_per_series() {
    let (_dir, pool) = create_test_db().await.unwrap();
    seed_series(&pool).await;

    let rows = rebuild_ratings(&pool, &TeamLogisticElo).await.unwrap();
    assert_eq!(rows, 8);

    let mut conn = pool.acquire().await.unwrap();
    let history = load_rating_history(&mut conn).await.unwrap();
    let first: Vec<(&str, i64)> = history[..4]
        .iter()
        .map(|s| (s.player_tag.as_str(), s.rating))
        .collect();
    assert_eq!(first, vec![("#A1", 425), ("#A2", 425), ("#B1", 375), ("#B2", 375)]);
    assert_eq!(history[0].timestamp, at_minute(15));
    assert_eq!(history[4].timestamp, at_minute(140));

    // Underdogs winning the second series gain more than 25
    assert!(history[6].rating - 375 > 25);
}

#[tokio::test]
async fn test_rebuild_is_deterministic_and_replaces_history() {
    let (_dir, pool) = create_test_db().await.unwrap();
    seed_series(&pool).await;

    let mut conn = pool.acquire().await.unwrap();
    insert_snapshots(
        &mut conn,
        &[RatingSnapshot {
            player_tag: "#STALE".into(),
            timestamp: at_minute(0),
            rating: 999,
        }],
    )
    .await
    .unwrap();
    drop(conn);

    rebuild_ratings(&pool, &TeamLogisticElo).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let first = load_rating_history(&mut conn).await.unwrap();
    drop(conn);

    rebuild_ratings(&pool, &TeamLogisticElo).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let second = load_rating_history(&mut conn).await.unwrap();

    assert_eq!(first, second);
    assert!(first.iter().all(|s| s.player_tag != "#STALE"));
}

#[tokio::test]
async fn test_fixed_step_policy() {
    let (_dir, pool) = create_test_db().await.unwrap();
    seed_series(&pool).await;

    rebuild_ratings(&pool, &FixedStep::default()).await.unwrap();
    let mut conn = pool.acquire().await.unwrap();
    let latest = latest_ratings(&mut conn).await.unwrap();

    // One win and one loss each: everyone is back at the start
    assert_eq!(latest.len(), 4);
    assert!(latest.iter().all(|(_, rating)| *rating == 400));
}

#[tokio::test]
async fn test_empty_series_store_writes_nothing() {
    let (_dir, pool) = create_test_db().await.unwrap();
    assert_eq!(rebuild_ratings(&pool, &TeamLogisticElo).await.unwrap(), 0);
}
