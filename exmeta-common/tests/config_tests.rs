//! Unit tests for configuration resolution and graceful degradation
//!
//! Uses serial_test to prevent races on the EXMETA_BASE_URL environment
//! variable. Tests that read or write it are marked with #[serial].

use exmeta_common::api::ApiRoutes;
use exmeta_common::config::{
    load_toml_config, parse_toml_config, ClientConfig, TomlConfig, BASE_URL_ENV,
    DEFAULT_CALLBACK_START_PORT,
};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;

#[test]
#[serial]
fn test_defaults_without_any_source() {
    env::remove_var(BASE_URL_ENV);

    let config = ClientConfig::resolve(None, &TomlConfig::default());

    assert_eq!(config.routes, ApiRoutes::compiled_default());
    assert_eq!(config.callback_start_port, DEFAULT_CALLBACK_START_PORT);
    assert_eq!(config.callback_timeout, Duration::from_secs(60));
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.poll_budget, Duration::from_secs(60));
    assert_eq!(config.log_level, "info");
}

#[test]
#[serial]
fn test_cli_beats_env_beats_toml() {
    env::set_var(BASE_URL_ENV, "https://env.example");
    let toml_config = TomlConfig {
        base_url: Some("https://toml.example".to_string()),
        ..Default::default()
    };

    let from_cli = ClientConfig::resolve(Some("https://cli.example/"), &toml_config);
    assert_eq!(from_cli.routes.base_url(), "https://cli.example");

    let from_env = ClientConfig::resolve(None, &toml_config);
    assert_eq!(from_env.routes.base_url(), "https://env.example");

    env::remove_var(BASE_URL_ENV);
    let from_toml = ClientConfig::resolve(None, &toml_config);
    assert_eq!(from_toml.routes.base_url(), "https://toml.example");
}

#[test]
#[serial]
fn test_blank_env_does_not_mask_toml() {
    env::set_var(BASE_URL_ENV, "   ");
    let toml_config = TomlConfig {
        base_url: Some("https://toml.example".to_string()),
        ..Default::default()
    };

    let config = ClientConfig::resolve(None, &toml_config);
    assert_eq!(config.routes.base_url(), "https://toml.example");

    env::remove_var(BASE_URL_ENV);
}

#[test]
fn test_parse_full_toml() {
    let toml_config = parse_toml_config(
        r#"
        base_url = "http://127.0.0.1:5597"
        callback_start_port = 9100

        [auth]
        callback_timeout_ms = 1000
        poll_interval_ms = 50
        poll_budget_ms = 2000

        [logging]
        level = "debug"
        "#,
    )
    .unwrap();

    assert_eq!(toml_config.callback_start_port, Some(9100));
    assert_eq!(toml_config.auth.poll_interval_ms, Some(50));
    assert_eq!(toml_config.logging.level, "debug");
}

#[test]
#[serial]
fn test_toml_timings_flow_into_client_config() {
    env::remove_var(BASE_URL_ENV);
    let toml_config = parse_toml_config(
        r#"
        callback_start_port = 9100
        [auth]
        callback_timeout_ms = 1000
        poll_budget_ms = 2000
        "#,
    )
    .unwrap();

    let config = ClientConfig::resolve(None, &toml_config);
    assert_eq!(config.callback_start_port, 9100);
    assert_eq!(config.callback_timeout, Duration::from_millis(1000));
    assert_eq!(config.poll_interval, Duration::from_millis(500));
    assert_eq!(config.poll_budget, Duration::from_millis(2000));
}

#[test]
fn test_empty_toml_uses_defaults() {
    let toml_config = parse_toml_config("").unwrap();
    assert!(toml_config.base_url.is_none());
    assert_eq!(toml_config.logging.level, "info");
}

#[test]
fn test_malformed_toml_is_config_error() {
    let err = parse_toml_config("base_url = [unterminated").unwrap_err();
    assert!(matches!(err, exmeta_common::Error::Config(_)));
}

#[test]
fn test_load_explicit_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "base_url = \"https://file.example\"").unwrap();

    let toml_config = load_toml_config(Some(file.path())).unwrap();
    assert_eq!(toml_config.base_url.as_deref(), Some("https://file.example"));
}

#[test]
fn test_load_missing_explicit_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let err = load_toml_config(Some(&missing)).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
}
