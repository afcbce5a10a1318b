// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Courier messaging client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Courier configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CourierConfig {
    /// Gateway endpoint, credential, and timing settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Automatic reconnection settings.
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Inbound/outbound message deduplication settings.
    #[serde(default)]
    pub deduplication: DedupConfig,
}

/// Gateway connection configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket URL of the messaging gateway (`ws://` or `wss://`).
    #[serde(default)]
    pub gateway_url: String,

    /// Opaque session credential presented during the handshake.
    #[serde(default)]
    pub token: Option<String>,

    /// Interval between liveness probes while connected, in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Time allowed for the transport to open and the gateway to answer
    /// the handshake, in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// Emit frame-level debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ClientConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    /// Effective log level, raised to `debug` when the debug flag is set.
    pub fn effective_log_level(&self) -> &str {
        if self.debug { "debug" } else { &self.log_level }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            token: None,
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            connection_timeout_ms: default_connection_timeout_ms(),
            debug: false,
            log_level: default_log_level(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("gateway_url", &self.gateway_url)
            .field("token", &self.token.as_ref().map(|_| "[redacted]"))
            .field("heartbeat_interval_ms", &self.heartbeat_interval_ms)
            .field("connection_timeout_ms", &self.connection_timeout_ms)
            .field("debug", &self.debug)
            .field("log_level", &self.log_level)
            .finish()
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_connection_timeout_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Reconnection policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReconnectConfig {
    /// Reconnect automatically after a closure the caller did not initiate.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Attempts per outage before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first attempt, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Factor applied to the delay after each attempt.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

/// Backend used to persist seen message ids.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageType {
    /// Process-lifetime map.
    #[default]
    Memory,
    /// SQLite key-value table; cleanup scans every row.
    PersistentKv,
    /// SQLite table with a timestamp index; cleanup is a range delete.
    PersistentIndexed,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageType::Memory => "memory",
            StorageType::PersistentKv => "persistent-kv",
            StorageType::PersistentIndexed => "persistent-indexed",
        }
    }

    pub fn is_persistent(&self) -> bool {
        !matches!(self, StorageType::Memory)
    }
}

/// Deduplication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DedupConfig {
    /// Suppress re-delivery of already-seen message ids.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Storage backend for seen ids.
    #[serde(default)]
    pub storage: StorageType,

    /// Retention window for a seen id, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Interval of the background sweep that evicts expired ids, in seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// SQLite file for the persistent backends.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: StorageType::default(),
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            database_path: default_database_path(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("courier").join("dedup.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("courier-dedup.db"))
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CourierConfig::default();
        assert_eq!(config.client.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.client.connection_timeout(), Duration::from_secs(10));
        assert!(config.reconnect.enabled);
        assert_eq!(config.deduplication.ttl(), Duration::from_secs(604_800));
        assert_eq!(config.deduplication.storage, StorageType::Memory);
    }

    #[test]
    fn debug_output_redacts_token() {
        let client = ClientConfig {
            token: Some("super-secret".into()),
            ..ClientConfig::default()
        };
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn debug_flag_raises_log_level() {
        let mut client = ClientConfig::default();
        assert_eq!(client.effective_log_level(), "info");
        client.debug = true;
        assert_eq!(client.effective_log_level(), "debug");
    }

    #[test]
    fn storage_type_kebab_case() {
        let parsed: DedupConfig =
            toml::from_str(r#"storage = "persistent-indexed""#).expect("should parse");
        assert_eq!(parsed.storage, StorageType::PersistentIndexed);
        assert!(parsed.storage.is_persistent());
        assert_eq!(StorageType::PersistentKv.as_str(), "persistent-kv");
    }
}
