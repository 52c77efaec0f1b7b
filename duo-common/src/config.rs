//! Configuration loading and validation
//!
//! Every setting is resolved with the following priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error. A configuration that fails
//! [`TrackerConfig::validate`] is fatal: nothing may be processed with it.

use crate::{Error, Result};
use chrono::Duration;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Game mode id of the tracked 2v2 draft mode
pub const DEFAULT_TARGET_MODE_ID: i64 = 72000051;

/// Battle type reported by the feed for clan-mate duo games
pub const DEFAULT_DUO_MATCH_TYPE: &str = "clanMate2v2";

pub const DEFAULT_SESSION_MAX_GAP_MINUTES: i64 = 30;
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 20;
pub const DEFAULT_SERIES_WINDOW_HOURS: i64 = 6;
pub const DEFAULT_API_BASE_URL: &str = "https://api.clashroyale.com/v1";
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 5;

const APP_DIR: &str = "duo-tracker";

/// Logging section of the TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// On-disk TOML configuration; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub api_token: Option<String>,
    pub player_tags: Option<Vec<String>>,
    pub player_names: Option<Vec<String>>,
    pub clan_tag: Option<String>,
    pub database_path: Option<PathBuf>,
    pub session_max_gap_minutes: Option<i64>,
    pub target_mode_id: Option<i64>,
    pub duo_match_types: Option<Vec<String>>,
    pub sync_interval_minutes: Option<u64>,
    pub series_window_hours: Option<i64>,
    pub api_base_url: Option<String>,
    pub requests_per_second: Option<u32>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Path of the file to read: `explicit_path` when given, otherwise the
    /// default location if a file exists there.
    pub fn locate(explicit_path: Option<&Path>) -> Option<PathBuf> {
        match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|path| path.exists()),
        }
    }

    /// Read the file at `path`, or an empty configuration when there is none.
    ///
    /// A path that cannot be read is a configuration error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

/// Command-line overrides (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
}

/// Fully resolved tracker configuration
///
/// Passed explicitly to every component; nothing reads configuration from
/// global state.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Bearer token for the upstream match-history feed
    pub api_token: String,
    /// Tracked player tags (trimmed, upper-case)
    pub player_tags: Vec<String>,
    /// Display names, index-aligned with `player_tags`
    pub player_names: Vec<String>,
    /// When set, every participant must belong to this clan
    pub clan_tag: Option<String>,
    pub database_path: PathBuf,
    pub session_max_gap_minutes: i64,
    pub target_mode_id: i64,
    pub duo_match_types: Vec<String>,
    pub sync_interval_minutes: u64,
    pub series_window_hours: i64,
    pub api_base_url: String,
    pub requests_per_second: u32,
    pub log_level: String,
    /// TOML file the configuration was read from, if any
    pub config_file: Option<PathBuf>,
}

impl TrackerConfig {
    /// Build a configuration with compiled defaults for everything except
    /// the credential and the tracked players.
    pub fn with_defaults(
        api_token: impl Into<String>,
        player_tags: Vec<String>,
        player_names: Vec<String>,
    ) -> Self {
        Self {
            api_token: api_token.into(),
            player_tags: player_tags.iter().map(|t| normalize_tag(t)).collect(),
            player_names: player_names.iter().map(|n| n.trim().to_string()).collect(),
            clan_tag: None,
            database_path: default_database_path(),
            session_max_gap_minutes: DEFAULT_SESSION_MAX_GAP_MINUTES,
            target_mode_id: DEFAULT_TARGET_MODE_ID,
            duo_match_types: vec![DEFAULT_DUO_MATCH_TYPE.to_string()],
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            series_window_hours: DEFAULT_SERIES_WINDOW_HOURS,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            log_level: default_log_level(),
            config_file: None,
        }
    }

    /// Resolve configuration from CLI, process environment, an already loaded
    /// TOML file and defaults, then validate it.
    pub fn resolve(
        cli: &CliOverrides,
        toml_config: TomlConfig,
        config_file: Option<PathBuf>,
    ) -> Result<Self> {
        let mut config = Self::from_sources(cli, |key| std::env::var(key).ok(), toml_config)?;
        config.config_file = config_file;
        config.validate()?;
        Ok(config)
    }

    /// Merge the configuration sources without validating.
    ///
    /// `env` looks up an environment variable by name.
    pub fn from_sources<F>(cli: &CliOverrides, env: F, toml_config: TomlConfig) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let api_token = env("DUO_API_TOKEN")
            .or(toml_config.api_token)
            .unwrap_or_default()
            .trim()
            .to_string();

        let player_tags = env("DUO_PLAYER_TAGS")
            .map(|v| split_list(&v))
            .or(toml_config.player_tags)
            .unwrap_or_default();
        let player_names = env("DUO_PLAYER_NAMES")
            .map(|v| split_list(&v))
            .or(toml_config.player_names)
            .unwrap_or_default();

        let mut config = Self::with_defaults(api_token, player_tags, player_names);

        config.clan_tag = env("DUO_CLAN_TAG")
            .or(toml_config.clan_tag)
            .map(|t| normalize_tag(&t))
            .filter(|t| !t.is_empty());

        if let Some(path) = cli
            .database_path
            .clone()
            .or_else(|| env("DUO_DATABASE").map(PathBuf::from))
            .or(toml_config.database_path)
        {
            config.database_path = path;
        }

        if let Some(gap) = parse_env(&env, "DUO_SESSION_MAX_GAP_MINUTES")?
            .or(toml_config.session_max_gap_minutes)
        {
            config.session_max_gap_minutes = gap;
        }
        if let Some(mode) = parse_env(&env, "DUO_TARGET_MODE_ID")?.or(toml_config.target_mode_id) {
            config.target_mode_id = mode;
        }
        if let Some(types) = toml_config.duo_match_types {
            config.duo_match_types = types;
        }
        if let Some(minutes) = parse_env(&env, "DUO_SYNC_INTERVAL_MINUTES")?
            .or(toml_config.sync_interval_minutes)
        {
            config.sync_interval_minutes = minutes;
        }
        if let Some(hours) = toml_config.series_window_hours {
            config.series_window_hours = hours;
        }
        if let Some(url) = env("DUO_API_BASE_URL").or(toml_config.api_base_url) {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(rps) = toml_config.requests_per_second {
            config.requests_per_second = rps;
        }
        config.log_level = toml_config.logging.level;

        Ok(config)
    }

    /// Check the configuration before any processing starts
    pub fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            return Err(Error::Config(
                "Missing API token. Set DUO_API_TOKEN or api_token in the config file".to_string(),
            ));
        }
        if self.player_tags.is_empty() {
            return Err(Error::Config("No tracked players configured".to_string()));
        }
        if self.player_tags.len() != self.player_names.len() {
            return Err(Error::Config(format!(
                "player_tags ({}) and player_names ({}) must have the same length",
                self.player_tags.len(),
                self.player_names.len()
            )));
        }
        let unique: HashSet<&String> = self.player_tags.iter().collect();
        if unique.len() != self.player_tags.len() {
            return Err(Error::Config("player_tags contains duplicates".to_string()));
        }
        if self.duo_match_types.is_empty() {
            return Err(Error::Config("duo_match_types must not be empty".to_string()));
        }
        if self.session_max_gap_minutes <= 0 {
            return Err(Error::Config(
                "session_max_gap_minutes must be positive".to_string(),
            ));
        }
        if self.sync_interval_minutes == 0 {
            return Err(Error::Config("sync_interval_minutes must be positive".to_string()));
        }
        if self.requests_per_second == 0 {
            return Err(Error::Config("requests_per_second must be positive".to_string()));
        }
        if self.series_window_hours <= 0 {
            warn!("series_window_hours <= 0: incremental runs will scan all matches");
        }
        Ok(())
    }

    /// Maximum gap between consecutive matches of one session
    pub fn session_max_gap(&self) -> Duration {
        Duration::minutes(self.session_max_gap_minutes)
    }

    /// Set of tracked player tags
    pub fn tracked_tags(&self) -> HashSet<String> {
        self.player_tags.iter().cloned().collect()
    }

    /// Tracked players as (tag, name) pairs
    pub fn tracked_players(&self) -> impl Iterator<Item = (&str, &str)> {
        self.player_tags
            .iter()
            .map(String::as_str)
            .zip(self.player_names.iter().map(String::as_str))
    }
}

/// Canonical form of a player or clan tag
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_uppercase()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Invalid {}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}

/// Default TOML file location (`<config dir>/duo-tracker/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Default database location (`<local data dir>/duo-tracker/duo_series.db`)
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("duo_series.db")
}
