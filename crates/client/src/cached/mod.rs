//! Fetch-and-cache decorator.
//!
//! [`CachedFetcher`] wraps any [`Fetcher`] with a [`Store`]:
//!
//! - hit: the stored page is returned as is (no count change, no TTL refresh)
//! - miss: the inner fetcher runs, the page is stored with the TTL, and the
//!   URL's access counter is incremented
//!
//! The counter therefore tracks real fetches, not requests. Errors from the
//! store or the fetch propagate unchanged; a failed fetch stores nothing and
//! leaves the counter alone.
//!
//! With `single_flight` on, concurrent misses for one URL are serialized and
//! only the first performs the fetch; the rest read what it stored.

mod flight;

use std::time::Duration;

use async_trait::async_trait;
use webcache_core::{DEFAULT_TTL, Error, Store, count_key};

use crate::fetch::Fetcher;
use flight::Flights;

/// Behavior knobs for [`CachedFetcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheOptions {
    /// Lifetime of a cached page.
    pub ttl: Duration,

    /// Collapse concurrent misses for the same URL into one fetch.
    pub single_flight: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL, single_flight: true }
    }
}

impl From<&webcache_core::AppConfig> for CacheOptions {
    fn from(config: &webcache_core::AppConfig) -> Self {
        Self { ttl: config.ttl(), single_flight: config.single_flight }
    }
}

/// A [`Fetcher`] that memoizes pages in a [`Store`] and counts real fetches.
pub struct CachedFetcher<F, S> {
    inner: F,
    store: S,
    options: CacheOptions,
    flights: Flights,
}

impl<F: Fetcher, S: Store> CachedFetcher<F, S> {
    /// Wrap `inner` with default options (10s TTL, single-flight on).
    pub fn new(inner: F, store: S) -> Self {
        Self::with_options(inner, store, CacheOptions::default())
    }

    /// Wrap `inner` with explicit options.
    pub fn with_options(inner: F, store: S, options: CacheOptions) -> Self {
        Self { inner, store, options, flights: Flights::default() }
    }

    /// Number of real fetches performed for `url` since the store was last flushed.
    pub async fn access_count(&self, url: &str) -> Result<i64, Error> {
        self.store.get_count(&count_key(url)).await
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The wrapped fetcher.
    pub fn inner(&self) -> &F {
        &self.inner
    }

    /// Options this decorator was built with.
    pub fn options(&self) -> CacheOptions {
        self.options
    }

    async fn fill(&self, url: &str) -> Result<String, Error> {
        let content = self.inner.fetch(url).await?;
        self.store.store(url, &content, self.options.ttl).await?;
        let count = self.store.increment(&count_key(url)).await?;

        tracing::debug!(url, count, bytes = content.len(), "cache miss filled");
        Ok(content)
    }
}

#[async_trait]
impl<F: Fetcher, S: Store> Fetcher for CachedFetcher<F, S> {
    async fn fetch(&self, url: &str) -> Result<String, Error> {
        if let Some(content) = self.store.get(url).await? {
            tracing::debug!(url, "cache hit");
            return Ok(content);
        }

        if !self.options.single_flight {
            return self.fill(url).await;
        }

        let _flight = self.flights.enter(url).await;

        if let Some(content) = self.store.get(url).await? {
            tracing::debug!(url, "cache filled by concurrent request");
            return Ok(content);
        }

        self.fill(url).await
    }
}

impl<F, S: std::fmt::Debug> std::fmt::Debug for CachedFetcher<F, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("store", &self.store)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use webcache_core::MemoryStore;

    /// Fetcher that records how often it was called.
    #[derive(Default)]
    struct CountingFetcher {
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl CountingFetcher {
        fn slow(delay: Duration) -> Self {
            Self { calls: AtomicUsize::new(0), delay: Some(delay) }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, Error> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(format!("{url} #{n}"))
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn fetch(&self, _url: &str) -> Result<String, Error> {
            Err(Error::Http("network error: connection refused".into()))
        }
    }

    /// Store whose every command fails like a dropped connection.
    struct DownStore;

    fn connection_lost() -> Error {
        redis::RedisError::from((redis::ErrorKind::IoError, "connection lost")).into()
    }

    #[async_trait]
    impl Store for DownStore {
        async fn store(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), Error> {
            Err(connection_lost())
        }

        async fn get(&self, _key: &str) -> Result<Option<String>, Error> {
            Err(connection_lost())
        }

        async fn increment(&self, _key: &str) -> Result<i64, Error> {
            Err(connection_lost())
        }

        async fn get_count(&self, _key: &str) -> Result<i64, Error> {
            Err(connection_lost())
        }

        async fn flush(&self) -> Result<(), Error> {
            Err(connection_lost())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_hit_expire_cycle() {
        let url = "http://example.com/a";
        let cached = CachedFetcher::new(CountingFetcher::default(), MemoryStore::new());

        let first = cached.fetch(url).await.unwrap();
        assert_eq!(first, "http://example.com/a #1");
        assert_eq!(cached.access_count(url).await.unwrap(), 1);

        let second = cached.fetch(url).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(cached.access_count(url).await.unwrap(), 1);
        assert_eq!(cached.inner().calls(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;

        let third = cached.fetch(url).await.unwrap();
        assert_eq!(third, "http://example.com/a #2");
        assert_eq!(cached.access_count(url).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_does_not_refresh_ttl() {
        let url = "http://example.com/ttl";
        let cached = CachedFetcher::new(CountingFetcher::default(), MemoryStore::new());

        cached.fetch(url).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cached.fetch(url).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        cached.fetch(url).await.unwrap();

        assert_eq!(cached.inner().calls(), 2);
        assert_eq!(cached.access_count(url).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl() {
        let url = "http://example.com/short";
        let options = CacheOptions { ttl: Duration::from_secs(2), ..Default::default() };
        let cached = CachedFetcher::with_options(CountingFetcher::default(), MemoryStore::new(), options);

        cached.fetch(url).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        cached.fetch(url).await.unwrap();

        assert_eq!(cached.access_count(url).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_urls_tracked_independently() {
        let cached = CachedFetcher::new(CountingFetcher::default(), MemoryStore::new());

        cached.fetch("http://example.com/a").await.unwrap();
        cached.fetch("http://example.com/a").await.unwrap();
        cached.fetch("http://example.com/b").await.unwrap();

        assert_eq!(cached.access_count("http://example.com/a").await.unwrap(), 1);
        assert_eq!(cached.access_count("http://example.com/b").await.unwrap(), 1);
        assert_eq!(cached.access_count("http://example.com/never").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_page_and_counter_keys() {
        let store = MemoryStore::new();
        let cached = CachedFetcher::new(CountingFetcher::default(), &store);

        cached.fetch("http://example.com/a").await.unwrap();

        assert_eq!(store.get("http://example.com/a").await.unwrap().as_deref(), Some("http://example.com/a #1"));
        assert_eq!(store.get_count("count:http://example.com/a").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_content_is_a_hit() {
        let fetcher = crate::fetch::from_fn(|_url: String| async { Ok::<_, Error>(String::new()) });
        let cached = CachedFetcher::new(fetcher, MemoryStore::new());

        assert_eq!(cached.fetch("http://example.com/empty").await.unwrap(), "");
        assert_eq!(cached.fetch("http://example.com/empty").await.unwrap(), "");
        assert_eq!(cached.access_count("http://example.com/empty").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_without_side_effects() {
        let store = MemoryStore::new();
        let cached = CachedFetcher::new(FailingFetcher, &store);

        let result = cached.fetch("http://example.com/down").await;

        assert!(matches!(result, Err(Error::Http(_))));
        assert!(store.is_empty().await);
        assert_eq!(cached.access_count("http://example.com/down").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_error_propagates_before_fetch() {
        let cached = CachedFetcher::new(CountingFetcher::default(), DownStore);

        let result = cached.fetch("http://example.com/a").await;

        assert!(matches!(result, Err(ref e) if e.is_store()));
        assert_eq!(cached.inner().calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_collapses_concurrent_misses() {
        let url = "http://example.com/slow";
        let cached = CachedFetcher::new(CountingFetcher::slow(Duration::from_secs(5)), MemoryStore::new());

        let (a, b, c) = tokio::join!(cached.fetch(url), cached.fetch(url), cached.fetch(url));

        assert_eq!(a.unwrap(), "http://example.com/slow #1");
        assert_eq!(b.unwrap(), "http://example.com/slow #1");
        assert_eq!(c.unwrap(), "http://example.com/slow #1");
        assert_eq!(cached.inner().calls(), 1);
        assert_eq!(cached.access_count(url).await.unwrap(), 1);
        assert_eq!(cached.flights.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_without_single_flight_concurrent_misses_all_fetch() {
        let url = "http://example.com/slow";
        let options = CacheOptions { single_flight: false, ..Default::default() };
        let cached = CachedFetcher::with_options(CountingFetcher::slow(Duration::from_secs(5)), MemoryStore::new(), options);

        let (a, b) = tokio::join!(cached.fetch(url), cached.fetch(url));

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(cached.inner().calls(), 2);
        assert_eq!(cached.access_count(url).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_does_not_serialize_distinct_urls() {
        let cached = CachedFetcher::new(CountingFetcher::slow(Duration::from_secs(5)), MemoryStore::new());
        let start = tokio::time::Instant::now();

        let (a, b) = tokio::join!(cached.fetch("http://example.com/a"), cached.fetch("http://example.com/b"));

        assert!(a.is_ok() && b.is_ok());
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(cached.inner().calls(), 2);
    }

    #[tokio::test]
    async fn test_decorators_compose() {
        let store = MemoryStore::new();
        let inner = CachedFetcher::new(CountingFetcher::default(), &store);
        let outer = CachedFetcher::new(&inner, MemoryStore::new());

        outer.fetch("http://example.com/a").await.unwrap();
        outer.fetch("http://example.com/a").await.unwrap();

        assert_eq!(inner.inner().calls(), 1);
        assert_eq!(outer.access_count("http://example.com/a").await.unwrap(), 1);
        assert_eq!(inner.access_count("http://example.com/a").await.unwrap(), 1);
    }

    #[test]
    fn test_options_accessor() {
        let options = CacheOptions { ttl: Duration::from_secs(3), single_flight: false };
        let cached = CachedFetcher::with_options(CountingFetcher::default(), MemoryStore::new(), options);
        assert_eq!(cached.options(), options);
        assert_eq!(CachedFetcher::new(FailingFetcher, MemoryStore::new()).options(), CacheOptions::default());
    }

    #[test]
    fn test_options_from_app_config() {
        let config = webcache_core::AppConfig { ttl_secs: 30, single_flight: false, ..Default::default() };
        let options = CacheOptions::from(&config);
        assert_eq!(options.ttl, Duration::from_secs(30));
        assert!(!options.single_flight);
    }
}
