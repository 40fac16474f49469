//! Crawler module for page fetching and listing collection
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - The page-by-page crawl loop with in-run deduplication
//! - Session wiring from configuration to a finished run

mod coordinator;
mod fetcher;

pub use coordinator::{page_url, CrawlOptions, Crawler};
pub use fetcher::{build_http_client, Fetcher, RetryPolicy};

use crate::config::Config;
use crate::listing::{Extractor, ListingRecord};
use crate::storage::{resolve_output_dir, JsonlStorage};
use async_trait::async_trait;
use std::path::PathBuf;

/// Anything that can produce the markup of a page
///
/// [`Fetcher`] is the network implementation; tests substitute stubs.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Returns the page body, or a terminal error once retries are spent
    async fn fetch_page(&self, url: &str) -> crate::Result<String>;
}

/// Outcome of one crawl session
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// Listings that were new in this run
    pub records: Vec<ListingRecord>,

    /// JSONL file the listings were appended to
    pub output_path: PathBuf,
}

/// Runs one complete crawl session from configuration
///
/// This is the main entry point for a crawl. It will:
/// 1. Build the fetcher and extractor
/// 2. Pick the output directory and open the JSONL file
/// 3. Walk the result pages, persisting new listings per page
///
/// # Returns
///
/// * `Ok(SessionSummary)` - The run finished (possibly early on a fetch failure)
/// * `Err(ScraperError)` - Setup or persistence failed
pub async fn run_session(config: &Config) -> crate::Result<SessionSummary> {
    let fetcher = Fetcher::from_config(&config.fetcher)?;
    let extractor = Extractor::new()?;

    let output_dir = resolve_output_dir(config.output.directory.as_deref());
    let storage = JsonlStorage::new(&output_dir, &config.output.filename)?;
    let output_path = storage.path().to_path_buf();

    tracing::info!(
        "Starting crawl of {} (max {} pages), writing to {}",
        config.crawler.start_url,
        config.crawler.max_pages,
        output_path.display()
    );

    let mut crawler = Crawler::new(fetcher, extractor, storage);
    let records = crawler
        .run(&config.crawler.start_url, &CrawlOptions::from(&config.crawler))
        .await?;

    tracing::info!("Crawl finished with {} new listings", records.len());

    Ok(SessionSummary {
        records,
        output_path,
    })
}
