// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Courier configuration system.

use courier_config::diagnostic::ConfigError;
use courier_config::model::{CourierConfig, StorageType};
use courier_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with all known fields deserializes successfully.
#[test]
fn valid_toml_deserializes_into_courier_config() {
    let toml = r#"
[client]
gateway_url = "wss://chat.example.com/ws"
token = "header.payload.sig"
heartbeat_interval_ms = 15000
connection_timeout_ms = 5000
debug = true

[reconnect]
enabled = false
max_attempts = 2
initial_delay_ms = 100
max_delay_ms = 400
backoff_multiplier = 2.0

[deduplication]
enabled = true
storage = "persistent-kv"
ttl_secs = 3600
cleanup_interval_secs = 60
database_path = "/tmp/dedup.db"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.client.gateway_url, "wss://chat.example.com/ws");
    assert_eq!(config.client.token.as_deref(), Some("header.payload.sig"));
    assert_eq!(config.client.heartbeat_interval_ms, 15_000);
    assert_eq!(config.client.connection_timeout_ms, 5_000);
    assert!(config.client.debug);
    assert!(!config.reconnect.enabled);
    assert_eq!(config.reconnect.max_attempts, 2);
    assert_eq!(config.reconnect.initial_delay_ms, 100);
    assert_eq!(config.reconnect.max_delay_ms, 400);
    assert_eq!(config.deduplication.storage, StorageType::PersistentKv);
    assert_eq!(config.deduplication.ttl_secs, 3600);
    assert_eq!(config.deduplication.database_path, "/tmp/dedup.db");
}

/// Sections that are left out fall back to defaults.
#[test]
fn partial_toml_keeps_defaults() {
    let config = load_config_from_str(
        r#"
[client]
gateway_url = "ws://localhost:9000/ws"
"#,
    )
    .unwrap();
    let defaults = CourierConfig::default();
    assert_eq!(config.client.heartbeat_interval_ms, 30_000);
    assert_eq!(config.client.connection_timeout_ms, 10_000);
    assert_eq!(config.reconnect.max_attempts, defaults.reconnect.max_attempts);
    assert_eq!(config.deduplication.ttl_secs, 604_800);
}

/// Unknown field in [client] produces an UnknownKey diagnostic with a suggestion.
#[test]
fn unknown_field_in_client_suggests_correction() {
    let errors = load_and_validate_str(
        r#"
[client]
gatway_url = "ws://localhost/ws"
"#,
    )
    .expect_err("should reject unknown field");

    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::UnknownKey { key, suggestion, .. }
            if key == "gatway_url" && suggestion.as_deref() == Some("gateway_url")
    )));
}

/// Unknown section at the top level is rejected.
#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str(
        r#"
[metrics]
enabled = true
"#,
    )
    .expect_err("should reject unknown section");
    assert!(format!("{err}").contains("metrics"));
}

/// An unsupported storage backend names the accepted values.
#[test]
fn unknown_storage_type_is_rejected() {
    let errors = load_and_validate_str(
        r#"
[deduplication]
storage = "redis"
"#,
    )
    .expect_err("should reject unknown storage");

    let rendered = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(rendered.contains("redis"), "got: {rendered}");
}

/// A wrong value type is reported rather than silently defaulted.
#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str(
        r#"
[reconnect]
max_attempts = "lots"
"#,
    )
    .expect_err("should reject string for integer");
    assert!(!errors.is_empty());
}

/// Semantic validation runs after successful deserialization.
#[test]
fn validation_errors_surface_through_load_and_validate() {
    let errors = load_and_validate_str(
        r#"
[client]
gateway_url = "https://not-a-socket"

[reconnect]
backoff_multiplier = 0.0
"#,
    )
    .expect_err("should fail validation");

    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}
