//! In-process store adapter.
//!
//! Mirrors the Redis semantics the cache relies on: values expire after
//! their TTL, `store` resets the expiry, counters start at 0 and never
//! expire unless stored with a TTL. Expiry is checked lazily on access using
//! the tokio clock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Store, parse_count, ttl_secs};
use crate::Error;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// In-memory store with per-key expiry.
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) keys.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the store holds no live keys.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn live_value(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn store(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        // Same rounding as SETEX so both backends expire at the same moment.
        let secs = ttl_secs(ttl)?;
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(secs))
            .ok_or_else(|| Error::InvalidInput(format!("ttl of {secs}s overflows the clock")))?;

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry { value: value.to_string(), expires_at: Some(expires_at) });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.live_value(key).await)
    }

    async fn increment(&self, key: &str) -> Result<i64, Error> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry { value: "0".to_string(), expires_at: None });

        let next = parse_count(key, &entry.value)?
            .checked_add(1)
            .ok_or_else(|| Error::Decode(format!("increment at {key} would overflow")))?;
        entry.value = next.to_string();

        Ok(next)
    }

    async fn get_count(&self, key: &str) -> Result<i64, Error> {
        match self.live_value(key).await {
            Some(raw) => parse_count(key, &raw),
            None => Ok(0),
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        self.entries.write().await.clear();
        tracing::debug!("flushed in-memory store");
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore").finish_non_exhaustive()
    }
}
