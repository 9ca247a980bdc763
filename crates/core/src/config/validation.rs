//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::keys::MAX_TTL_SECS;
use thiserror::Error;

/// URL schemes accepted by the redis client.
const REDIS_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `ttl_secs` is 0 or exceeds one year
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `redis_url` does not parse or uses a non-redis scheme
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid { field: "ttl_secs".into(), reason: "must be greater than 0".into() });
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "ttl_secs".into(),
                reason: format!("must not exceed {MAX_TTL_SECS} seconds (one year)"),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        let parsed = url::Url::parse(&self.redis_url)
            .map_err(|e| ConfigError::Invalid { field: "redis_url".into(), reason: e.to_string() })?;
        if !REDIS_SCHEMES.contains(&parsed.scheme()) {
            return Err(ConfigError::Invalid {
                field: "redis_url".into(),
                reason: format!("unsupported scheme: {}", parsed.scheme()),
            });
        }

        if !self.flush_on_start {
            tracing::debug!("flush_on_start disabled; counters carry over from previous runs");
        }

        Ok(())
    }
}
