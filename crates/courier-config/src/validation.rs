// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, positive intervals, and coherent backoff bounds.

use url::Url;

use crate::diagnostic::ConfigError;
use crate::model::CourierConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CourierConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    let url = config.client.gateway_url.trim();
    if !url.is_empty() {
        match Url::parse(url) {
            Ok(parsed) if !matches!(parsed.scheme(), "ws" | "wss") => invalid(format!(
                "client.gateway_url `{url}` must use the ws:// or wss:// scheme"
            )),
            Ok(parsed) if parsed.host_str().is_none_or(str::is_empty) => {
                invalid(format!("client.gateway_url `{url}` has no host"))
            }
            Ok(_) => {}
            Err(e) => invalid(format!("client.gateway_url `{url}` is not a valid URL: {e}")),
        }
    }

    if config.client.heartbeat_interval_ms == 0 {
        invalid("client.heartbeat_interval_ms must be greater than 0".to_string());
    }

    if config.client.connection_timeout_ms == 0 {
        invalid("client.connection_timeout_ms must be greater than 0".to_string());
    }

    let reconnect = &config.reconnect;
    if reconnect.max_attempts == 0 {
        invalid("reconnect.max_attempts must be at least 1".to_string());
    }

    if reconnect.initial_delay_ms > reconnect.max_delay_ms {
        invalid(format!(
            "reconnect.initial_delay_ms ({}) must not exceed reconnect.max_delay_ms ({})",
            reconnect.initial_delay_ms, reconnect.max_delay_ms
        ));
    }

    if !reconnect.backoff_multiplier.is_finite() || reconnect.backoff_multiplier < 1.0 {
        invalid(format!(
            "reconnect.backoff_multiplier must be at least 1.0, got {}",
            reconnect.backoff_multiplier
        ));
    }

    let dedup = &config.deduplication;
    if dedup.ttl_secs == 0 {
        invalid("deduplication.ttl_secs must be greater than 0".to_string());
    }

    if dedup.cleanup_interval_secs == 0 {
        invalid("deduplication.cleanup_interval_secs must be greater than 0".to_string());
    }

    if dedup.storage.is_persistent() && dedup.database_path.trim().is_empty() {
        invalid(format!(
            "deduplication.database_path must not be empty for `{}` storage",
            dedup.storage.as_str()
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
