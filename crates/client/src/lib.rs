//! Client code for web-cache.
//!
//! This crate provides the HTTP fetch collaborator and the caching
//! decorator that memoizes fetched pages in a store and counts real fetches.

pub mod cached;
pub mod fetch;

pub use cached::{CacheOptions, CachedFetcher};
pub use fetch::{FetchClient, FetchConfig, FetchResponse, Fetcher, FnFetcher, from_fn};
