//! Core types and shared functionality for web-cache.
//!
//! This crate provides:
//! - The store adapter trait with Redis and in-memory backends
//! - Unified error types
//! - Configuration structures
//! - Cache key helpers

pub mod config;
pub mod error;
pub mod keys;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use keys::{COUNT_PREFIX, DEFAULT_TTL, MAX_TTL_SECS, count_key};
pub use store::{MemoryStore, RedisStore, Store, StoreConfig};
