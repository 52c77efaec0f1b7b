//! Upstream match-history feed
//!
//! The sync loop only sees the [`MatchFeed`] trait; [`BattleLogClient`] is
//! the HTTP implementation.

pub mod battle_log_client;

pub use battle_log_client::BattleLogClient;

use crate::error::FeedError;
use async_trait::async_trait;

/// Source of a player's recent match payloads
#[async_trait]
pub trait MatchFeed: Send + Sync {
    /// Fetch the raw, undecoded payloads for one player tag
    async fn recent_matches(&self, player_tag: &str) -> Result<Vec<serde_json::Value>, FeedError>;
}
