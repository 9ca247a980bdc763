//! Redis-backed store adapter.
//!
//! Uses a single multiplexed async connection that is cloned per command.
//! Expiry relies on `SETEX`, counters on `INCR`.

use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};

use super::{Store, StoreConfig, parse_count, ttl_secs};
use crate::Error;

/// Store adapter over a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    url: String,
}

impl RedisStore {
    /// Connect to the server named by `config.redis_url`.
    ///
    /// When `flush_on_start` is set the current database is cleared before
    /// the handle is returned.
    pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
        let client = Client::open(config.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        let store = Self { conn, url: config.redis_url.clone() };

        tracing::info!(url = %store.url, "connected to redis");

        if config.flush_on_start {
            store.flush().await?;
        }

        Ok(store)
    }

    /// Connection URL this store was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Drop the connection.
    pub fn close(self) {
        tracing::debug!(url = %self.url, "closing redis connection");
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn store(&self, key: &str, value: &str, ttl: Duration) -> Result<(), Error> {
        let secs = ttl_secs(ttl)?;
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, secs).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let mut conn = self.conn.clone();
        let raw: Option<Vec<u8>> = conn.get(key).await?;

        raw.map(|bytes| String::from_utf8(bytes).map_err(|e| Error::Decode(format!("value at {key}: {e}"))))
            .transpose()
    }

    async fn increment(&self, key: &str) -> Result<i64, Error> {
        let mut conn = self.conn.clone();
        let count: i64 = conn.incr(key, 1).await?;
        Ok(count)
    }

    async fn get_count(&self, key: &str) -> Result<i64, Error> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(raw) => parse_count(key, &raw),
            None => Ok(0),
        }
    }

    async fn flush(&self) -> Result<(), Error> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
        tracing::info!(url = %self.url, "flushed redis database");
        Ok(())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_invalid_url() {
        let config = StoreConfig { redis_url: "not a url".into(), flush_on_start: false };
        let result = RedisStore::connect(&config).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 is reserved and never runs a redis server.
        let config = StoreConfig { redis_url: "redis://127.0.0.1:1/".into(), flush_on_start: false };
        let result = RedisStore::connect(&config).await;
        assert!(matches!(result, Err(Error::Store(_))));
    }
}
