//! web-cache command-line demonstration.
//!
//! Fetches a page through the cache, prints it, then prints how many real
//! fetches the URL has seen. Logging goes to stderr so stdout carries only
//! the page and the count line.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use webcache_client::{CacheOptions, CachedFetcher, FetchClient, FetchConfig, Fetcher};
use webcache_core::{AppConfig, MemoryStore, RedisStore, Store};

/// Page fetched when no URL is given (a deliberately slow endpoint).
const DEMO_URL: &str = "http://slowwly.robertomurray.co.uk/delay/5000/url/http://www.google.com";

/// Fetch a URL through the page cache and report its access count.
#[derive(Debug, Parser)]
#[command(name = "web-cache", version)]
struct Args {
    /// URL to fetch.
    #[arg(default_value = DEMO_URL)]
    url: String,

    /// Use an in-process store instead of Redis.
    #[arg(long)]
    memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();
    tracing::info!(url = %args.url, memory = args.memory, "starting web-cache");

    let config = AppConfig::load()?;
    let fetcher = FetchClient::new(FetchConfig::from(&config))?;
    let options = CacheOptions::from(&config);

    if args.memory {
        let cached = CachedFetcher::with_options(fetcher, MemoryStore::new(), options);
        return run(&cached, &args.url).await;
    }

    let store = RedisStore::connect(&config.store_config()).await?;
    let result = run(&CachedFetcher::with_options(fetcher, &store, options), &args.url).await;
    store.close();

    result
}

async fn run<F: Fetcher, S: Store>(cached: &CachedFetcher<F, S>, url: &str) -> Result<()> {
    let content = cached.fetch(url).await?;
    println!("{content}");

    let count = cached.access_count(url).await?;
    println!("URL accessed {count} times");

    Ok(())
}
