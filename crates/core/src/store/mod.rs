//! Store adapter over an external key-value service.
//!
//! The adapter exposes the handful of operations the page cache needs:
//!
//! - `store` writes a value with an expiry, replacing any previous value and TTL
//! - `get` returns the value while it is unexpired, `None` otherwise
//! - `increment` atomically bumps an integer counter (created at 0 if absent)
//! - `get_count` reads a counter, defaulting to 0
//! - `flush` clears the current database
//!
//! Expiry is owned by the backend. Nothing here sweeps or evicts.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::keys::MAX_TTL_SECS;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// Default connection URL, a Redis server on the local host.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Redis connection URL.
    pub redis_url: String,

    /// Clear the current database once connected.
    pub flush_on_start: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { redis_url: DEFAULT_REDIS_URL.to_string(), flush_on_start: true }
    }
}

/// Key-value operations required by the page cache.
#[async_trait]
pub trait Store: Send + Sync {
    /// Write `value` under `key`, expiring after `ttl`.
    async fn store(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error>;

    /// Read the current value of `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Atomically add one to the counter at `key` and return the new value.
    async fn increment(&self, key: &str) -> Result<i64, Error>;

    /// Read the counter at `key`, or 0 if it was never incremented.
    async fn get_count(&self, key: &str) -> Result<i64, Error>;

    /// Remove every key in the current database.
    async fn flush(&self) -> Result<(), Error>;
}

#[async_trait]
impl<S: Store + ?Sized> Store for &S {
    async fn store(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        (**self).store(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key).await
    }

    async fn increment(&self, key: &str) -> Result<i64, Error> {
        (**self).increment(key).await
    }

    async fn get_count(&self, key: &str) -> Result<i64, Error> {
        (**self).get_count(key).await
    }

    async fn flush(&self) -> Result<(), Error> {
        (**self).flush().await
    }
}

#[async_trait]
impl<S: Store + ?Sized> Store for Arc<S> {
    async fn store(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        (**self).store(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key).await
    }

    async fn increment(&self, key: &str) -> Result<i64, Error> {
        (**self).increment(key).await
    }

    async fn get_count(&self, key: &str) -> Result<i64, Error> {
        (**self).get_count(key).await
    }

    async fn flush(&self) -> Result<(), Error> {
        (**self).flush().await
    }
}

/// Whole seconds for a SET-with-expiry, rounding sub-second remainders up.
///
/// A zero TTL is rejected since the entry would never be readable, and so is
/// anything above [`MAX_TTL_SECS`].
pub(crate) fn ttl_secs(ttl: Duration) -> Result<u64, Error> {
    if ttl.is_zero() {
        return Err(Error::InvalidInput("ttl must be greater than 0".into()));
    }
    let secs = ttl.as_secs();
    let secs = if ttl.subsec_nanos() > 0 { secs.checked_add(1) } else { Some(secs) };
    match secs {
        Some(secs) if secs <= MAX_TTL_SECS => Ok(secs),
        _ => Err(Error::InvalidInput(format!("ttl must not exceed {MAX_TTL_SECS} seconds"))),
    }
}

/// Parse a stored counter value.
pub(crate) fn parse_count(key: &str, raw: &str) -> Result<i64, Error> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| Error::Decode(format!("value at {key} is not an integer: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379/");
        assert!(config.flush_on_start);
    }

    #[test]
    fn test_ttl_secs_whole() {
        assert_eq!(ttl_secs(Duration::from_secs(10)).unwrap(), 10);
    }

    #[test]
    fn test_ttl_secs_rounds_up() {
        assert_eq!(ttl_secs(Duration::from_millis(1500)).unwrap(), 2);
        assert_eq!(ttl_secs(Duration::from_millis(1)).unwrap(), 1);
    }

    #[test]
    fn test_ttl_secs_zero_rejected() {
        assert!(matches!(ttl_secs(Duration::ZERO), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_ttl_secs_too_large_rejected() {
        assert!(matches!(ttl_secs(Duration::MAX), Err(Error::InvalidInput(_))));
        assert!(matches!(ttl_secs(Duration::from_secs(u64::MAX)), Err(Error::InvalidInput(_))));
        assert!(matches!(ttl_secs(Duration::from_secs(MAX_TTL_SECS + 1)), Err(Error::InvalidInput(_))));
        assert_eq!(ttl_secs(Duration::from_secs(MAX_TTL_SECS)).unwrap(), MAX_TTL_SECS);
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("count:a", "42").unwrap(), 42);
        assert!(matches!(parse_count("count:a", "forty-two"), Err(Error::Decode(_))));
    }
}
