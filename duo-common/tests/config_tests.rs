//! Tests for configuration resolution and validation
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that manipulate DUO_* variables are marked with #[serial].

use duo_common::config::{CliOverrides, TomlConfig, TrackerConfig, DEFAULT_TARGET_MODE_ID};
use duo_common::Error;
use serial_test::serial;
use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::path::PathBuf;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_applied_when_only_required_values_given() {
    let env = env_from(&[
        ("DUO_API_TOKEN", "secret"),
        ("DUO_PLAYER_TAGS", "#AAA,#BBB"),
        ("DUO_PLAYER_NAMES", "Alice,Bob"),
    ]);

    let config =
        TrackerConfig::from_sources(&CliOverrides::default(), env, TomlConfig::default()).unwrap();
    config.validate().unwrap();

    assert_eq!(config.api_token, "secret");
    assert_eq!(config.session_max_gap_minutes, 30);
    assert_eq!(config.target_mode_id, DEFAULT_TARGET_MODE_ID);
    assert_eq!(config.duo_match_types, vec!["clanMate2v2".to_string()]);
    assert_eq!(config.sync_interval_minutes, 20);
    assert!(config.clan_tag.is_none());
    assert_eq!(config.log_level, "info");
}

#[test]
fn test_tags_are_trimmed_and_uppercased() {
    let env = env_from(&[
        ("DUO_API_TOKEN", "secret"),
        ("DUO_PLAYER_TAGS", " #abc , #Def,, "),
        ("DUO_PLAYER_NAMES", "Alice, Bob"),
        ("DUO_CLAN_TAG", " #clan1 "),
    ]);

    let config =
        TrackerConfig::from_sources(&CliOverrides::default(), env, TomlConfig::default()).unwrap();

    assert_eq!(config.player_tags, vec!["#ABC".to_string(), "#DEF".to_string()]);
    assert_eq!(config.player_names, vec!["Alice".to_string(), "Bob".to_string()]);
    assert_eq!(config.clan_tag.as_deref(), Some("#CLAN1"));
    let players: Vec<(&str, &str)> = config.tracked_players().collect();
    assert_eq!(players, vec![("#ABC", "Alice"), ("#DEF", "Bob")]);
}

#[test]
fn test_env_overrides_toml_and_cli_overrides_env() {
    let toml_config = TomlConfig::from_toml_str(
        r##"
        api_token = "from-toml"
        player_tags = ["#AAA"]
        player_names = ["Alice"]
        session_max_gap_minutes = 45
        database_path = "/tmp/from-toml.db"

        [logging]
        level = "debug"
        "##,
    )
    .unwrap();

    let env = env_from(&[
        ("DUO_API_TOKEN", "from-env"),
        ("DUO_DATABASE", "/tmp/from-env.db"),
    ]);
    let cli = CliOverrides {
        config_path: None,
        database_path: Some(PathBuf::from("/tmp/from-cli.db")),
    };

    let config = TrackerConfig::from_sources(&cli, env, toml_config).unwrap();

    assert_eq!(config.api_token, "from-env");
    assert_eq!(config.player_tags, vec!["#AAA".to_string()]);
    assert_eq!(config.session_max_gap_minutes, 45);
    assert_eq!(config.database_path, PathBuf::from("/tmp/from-cli.db"));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn test_missing_token_is_fatal() {
    let env = env_from(&[("DUO_PLAYER_TAGS", "#AAA"), ("DUO_PLAYER_NAMES", "Alice")]);
    let config =
        TrackerConfig::from_sources(&CliOverrides::default(), env, TomlConfig::default()).unwrap();

    match config.validate() {
        Err(Error::Config(msg)) => assert!(msg.contains("API token"), "unexpected: {}", msg),
        other => panic!("Expected config error, got {:?}", other),
    }
}

#[test]
fn test_mismatched_name_list_is_fatal() {
    let env = env_from(&[
        ("DUO_API_TOKEN", "secret"),
        ("DUO_PLAYER_TAGS", "#AAA,#BBB"),
        ("DUO_PLAYER_NAMES", "Alice"),
    ]);
    let config =
        TrackerConfig::from_sources(&CliOverrides::default(), env, TomlConfig::default()).unwrap();

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_non_positive_gap_is_fatal() {
    let mut config = TrackerConfig::with_defaults(
        "secret",
        vec!["#AAA".to_string()],
        vec!["Alice".to_string()],
    );
    config.session_max_gap_minutes = 0;

    assert!(matches!(config.validate(), Err(Error::Config(_))));
}

#[test]
fn test_unparseable_numeric_env_is_config_error() {
    let env = env_from(&[
        ("DUO_API_TOKEN", "secret"),
        ("DUO_SESSION_MAX_GAP_MINUTES", "half an hour"),
    ]);

    let result = TrackerConfig::from_sources(&CliOverrides::default(), env, TomlConfig::default());
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn test_invalid_toml_is_config_error() {
    assert!(matches!(
        TomlConfig::from_toml_str("player_tags = 12"),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_explicit_missing_config_file_is_error() {
    let result = TomlConfig::load(Some(std::path::Path::new(
        "/nonexistent/duo-tracker/config.toml",
    )));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_load_reads_process_environment_and_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "player_names = [\"Alice\", \"Bob\"]").unwrap();
    writeln!(file, "clan_tag = \"#q2\"").unwrap();
    file.flush().unwrap();

    env::set_var("DUO_API_TOKEN", "process-token");
    env::set_var("DUO_PLAYER_TAGS", "#aaa,#bbb");

    let cli = CliOverrides {
        config_path: Some(file.path().to_path_buf()),
        database_path: Some(PathBuf::from("/tmp/duo-config-test.db")),
    };
    let config_file = TomlConfig::locate(cli.config_path.as_deref());
    let result = TomlConfig::load(config_file.as_deref())
        .and_then(|t| TrackerConfig::resolve(&cli, t, config_file));

    env::remove_var("DUO_API_TOKEN");
    env::remove_var("DUO_PLAYER_TAGS");

    let config = result.unwrap();
    assert_eq!(config.api_token, "process-token");
    assert_eq!(config.player_tags, vec!["#AAA".to_string(), "#BBB".to_string()]);
    assert_eq!(config.clan_tag.as_deref(), Some("#Q2"));
    assert_eq!(config.config_file.as_deref(), Some(file.path()));
}

#[test]
fn test_locate_prefers_explicit_path() {
    let explicit = std::path::Path::new("/etc/duo-tracker/custom.toml");
    assert_eq!(TomlConfig::locate(Some(explicit)), Some(explicit.to_path_buf()));
    // No file means an empty configuration, not an error
    let empty = TomlConfig::load(None).unwrap();
    assert!(empty.api_token.is_none());
    assert_eq!(empty.logging.level, "info");
}
