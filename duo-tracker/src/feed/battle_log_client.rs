//! Battle-log HTTP client
//!
//! `GET {base}/players/{tag}/battlelog` with bearer authentication.
//! Requests are throttled by a process-wide rate limiter.

use super::MatchFeed;
use crate::error::FeedError;
use async_trait::async_trait;
use duo_common::TrackerConfig;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// Request timeout for one battle-log fetch
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

pub struct BattleLogClient {
    client: Client,
    base_url: String,
    api_token: String,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl BattleLogClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        requests_per_second: u32,
    ) -> Result<Self, FeedError> {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            rate_limiter: RateLimiter::direct(Quota::per_second(rate)),
        })
    }

    pub fn from_config(config: &TrackerConfig) -> Result<Self, FeedError> {
        Self::new(
            &config.api_base_url,
            &config.api_token,
            config.requests_per_second,
        )
    }

    /// Battle-log URL for a player tag (`#` is percent-encoded)
    pub fn battle_log_url(&self, player_tag: &str) -> String {
        format!(
            "{}/players/{}/battlelog",
            self.base_url,
            player_tag.trim().replace('#', "%23")
        )
    }
}

#[async_trait]
impl MatchFeed for BattleLogClient {
    async fn recent_matches(&self, player_tag: &str) -> Result<Vec<serde_json::Value>, FeedError> {
        self.rate_limiter.until_ready().await;

        let url = self.battle_log_url(player_tag);
        debug!(player = %player_tag, url = %url, "Fetching battle log");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::Status { status, body });
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))?;

        match body {
            serde_json::Value::Array(items) => {
                debug!(player = %player_tag, count = items.len(), "Battle log received");
                Ok(items)
            }
            other => Err(FeedError::Decode(format!(
                "expected a list of battles, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a list",
        serde_json::Value::Object(_) => "an object",
    }
}
