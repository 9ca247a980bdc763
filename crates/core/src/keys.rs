//! Cache and counter key helpers.

use std::time::Duration;

/// Prefix for per-URL access counters.
pub const COUNT_PREFIX: &str = "count:";

/// Default lifetime of a cached page.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Longest lifetime accepted for a cached page (one year).
pub const MAX_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Key of the access counter for `url`.
///
/// The URL is used verbatim so the counter lines up with the page key.
pub fn count_key(url: &str) -> String {
    format!("{COUNT_PREFIX}{url}")
}
