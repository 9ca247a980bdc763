//! Unified error types for web-cache.

/// Unified error types for the cache and fetch pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a zero TTL).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network or protocol failure while fetching.
    #[error("HTTP_ERROR: {0}")]
    Http(String),

    /// Fetch timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Backing store command or connection failed.
    #[error("STORE_ERROR: {0}")]
    Store(#[from] redis::RedisError),

    /// A stored value could not be decoded into the expected type.
    #[error("DECODE_ERROR: {0}")]
    Decode(String),
}

impl Error {
    /// Whether the error came from the backing store rather than the fetch.
    pub fn is_store(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}
