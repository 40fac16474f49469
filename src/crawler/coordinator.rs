//! Crawl loop - page-by-page orchestration
//!
//! This module walks the result pages of one search query:
//! - Builds the URL for each page number
//! - Fetches and extracts each page in turn
//! - Drops listings already seen earlier in the run
//! - Persists new listings as soon as their page is done

use crate::config::CrawlerConfig;
use crate::crawler::PageSource;
use crate::listing::{Extractor, ListingRecord};
use crate::storage::RecordSink;
use std::collections::HashSet;
use std::time::Duration;

/// Query parameter carrying the page number
const PAGE_PARAM: &str = "page";

/// Per-run crawl limits
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Highest page number to fetch
    pub max_pages: u32,

    /// Pause after each page
    pub delay: Duration,

    /// Stop once a page yields no listings at all
    pub stop_on_empty: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            delay: Duration::from_millis(config.delay_ms),
            stop_on_empty: config.stop_on_empty,
        }
    }
}

/// Sequential crawler over the result pages of one query
pub struct Crawler<P, S> {
    source: P,
    extractor: Extractor,
    sink: S,
}

impl<P: PageSource, S: RecordSink> Crawler<P, S> {
    pub fn new(source: P, extractor: Extractor, sink: S) -> Self {
        Self {
            source,
            extractor,
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs one crawl and returns the listings that were new in this run
    ///
    /// # Termination
    ///
    /// The loop ends after `max_pages`, after a page with no listings when
    /// `stop_on_empty` is set, or when a page cannot be fetched. All three
    /// return `Ok` with whatever was collected.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ListingRecord>)` - New listings in the order they were found
    /// * `Err(ScraperError::Storage)` - Persisting a page's listings failed
    pub async fn run(
        &mut self,
        start_url: &str,
        options: &CrawlOptions,
    ) -> crate::Result<Vec<ListingRecord>> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut collected: Vec<ListingRecord> = Vec::new();
        let mut page = 1;

        while page <= options.max_pages {
            let url = page_url(start_url, page);
            tracing::info!("Fetching page {}: {}", page, url);

            let markup = match self.source.fetch_page(&url).await {
                Ok(markup) => markup,
                Err(e) => {
                    tracing::error!("Fetch error on page {}, ending run: {}", page, e);
                    break;
                }
            };

            let records = self.extractor.extract(&markup, start_url);
            let found = records.len();
            tracing::info!("Found {} listings on page {}", found, page);

            let fresh = retain_unseen(records, &mut seen);
            if fresh.is_empty() {
                tracing::info!("No new listings on page {}", page);
            } else {
                let path = self.sink.save(&fresh)?;
                collected.extend(fresh);
                tracing::info!(
                    "Saved new listings to {} (total collected: {})",
                    path.display(),
                    collected.len()
                );
            }

            if options.stop_on_empty && found == 0 {
                tracing::info!("No listings on page {}, stopping", page);
                break;
            }

            page += 1;
            tokio::time::sleep(options.delay).await;
        }

        Ok(collected)
    }
}

/// Builds the URL of a result page; page 1 is the start URL itself
pub fn page_url(start_url: &str, page: u32) -> String {
    if page <= 1 {
        return start_url.to_string();
    }
    let separator = if start_url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", start_url, separator, PAGE_PARAM, page)
}

/// Keeps records whose key has not been seen yet, recording their keys
///
/// Records with neither id nor url are dropped without touching `seen`.
fn retain_unseen(records: Vec<ListingRecord>, seen: &mut HashSet<String>) -> Vec<ListingRecord> {
    records
        .into_iter()
        .filter(|record| match record.dedup_key() {
            Some(key) => seen.insert(key.to_string()),
            None => {
                tracing::debug!("Dropping listing without id or url");
                false
            }
        })
        .collect()
}
