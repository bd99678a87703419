// crates/event-bridge-cli/tests/settings.rs
// ============================================================================
// Module: CLI Settings Tests
// Description: Flag overrides layered over configuration files.
// Purpose: Ensure flags win and the merged result is validated.
// Dependencies: event-bridge-cli, event-bridge-config, tempfile
// ============================================================================

//! ## Overview
//! Exercises [`event_bridge_cli::settings::load_config`] with temporary files.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::fs;
use std::path::PathBuf;

use event_bridge_cli::settings::Overrides;
use event_bridge_cli::settings::load_config;
use event_bridge_config::ConfigError;
use event_bridge_config::SourceMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Writes `content` to `event-bridge.toml` in a fresh directory.
fn write_config(content: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("event-bridge.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

/// Minimal valid configuration.
const BASE_CONFIG: &str = r#"
[source]
uri = "amqp://broker.example/orders"
credit = 4

[sink]
uri = "http://sink.example/events"
"#;

// ============================================================================
// SECTION: Tests
// ============================================================================

/// Tests file values are used when no flags are given.
#[test]
fn file_values_apply_without_flags() {
    let (_dir, path) = write_config(BASE_CONFIG);
    let config = load_config(Some(&path), &Overrides::default()).unwrap();
    assert_eq!(config.source.uri, "amqp://broker.example/orders");
    assert_eq!(config.source.credit, 4);
    assert_eq!(config.source.mode, SourceMode::Client);
}

/// Tests every flag wins over the file.
#[test]
fn flags_override_file_values() {
    let (dir, path) = write_config(BASE_CONFIG);
    let overrides = Overrides {
        source_uri: Some("amqps://other.example/q".to_string()),
        sink_uri: Some("https://sink.example/in".to_string()),
        credit: Some(50),
        credentials_dir: Some(dir.path().to_path_buf()),
        server: true,
    };

    let config = load_config(Some(&path), &overrides).unwrap();

    assert_eq!(config.source.uri, "amqps://other.example/q");
    assert_eq!(config.sink.uri, "https://sink.example/in");
    assert_eq!(config.source.credit, 50);
    assert_eq!(config.source.credentials_dir.as_deref(), Some(dir.path()));
    assert_eq!(config.source.mode, SourceMode::Server);
}

/// Tests an out-of-range credit flag fails validation.
#[test]
fn invalid_override_fails_validation() {
    let (_dir, path) = write_config(BASE_CONFIG);
    let overrides = Overrides {
        credit: Some(0),
        ..Overrides::default()
    };
    assert!(matches!(load_config(Some(&path), &overrides), Err(ConfigError::Invalid(_))));
}

/// Tests server mode with an MQTT source is rejected.
#[test]
fn server_flag_with_mqtt_is_rejected() {
    let (_dir, path) = write_config(BASE_CONFIG);
    let overrides = Overrides {
        source_uri: Some("mqtt://broker.example/t".to_string()),
        server: true,
        ..Overrides::default()
    };
    assert!(matches!(load_config(Some(&path), &overrides), Err(ConfigError::Invalid(_))));
}

/// Tests an explicit missing file is an I/O error even with both URIs.
#[test]
fn explicit_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let overrides = Overrides {
        source_uri: Some("amqp://broker.example/orders".to_string()),
        sink_uri: Some("http://sink.example/".to_string()),
        ..Overrides::default()
    };
    let result = load_config(Some(&dir.path().join("absent.toml")), &overrides);
    assert!(matches!(result, Err(ConfigError::Io(_))));
}
