use serde::Deserialize;

/// Listing query used when neither the config file nor the environment names one
pub const DEFAULT_START_URL: &str = "https://www.otomoto.pl/osobowe/bmw/seria-5";

/// Environment variable holding the listing query URL
pub const START_URL_ENV: &str = "OTOMOTO_URL";

/// Main configuration structure for the scraper
///
/// Every key is optional; a missing section falls back to its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    pub output: OutputConfig,
}

/// Crawl loop behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Listing query URL; page 1 of the crawl
    pub start_url: String,

    /// Maximum number of pages to visit in one run
    pub max_pages: u32,

    /// Pause between consecutive pages (milliseconds)
    pub delay_ms: u64,

    /// Stop as soon as a page yields no listings at all
    pub stop_on_empty: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            max_pages: 5,
            delay_ms: 1000,
            stop_on_empty: true,
        }
    }
}

/// HTTP fetch behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Attempts per page before giving up
    pub max_attempts: u32,

    /// Backoff base after a 403/429 response (milliseconds, multiplied by attempt)
    pub blocked_backoff_ms: u64,

    /// Backoff base after any other failure (milliseconds, multiplied by attempt)
    pub retry_backoff_ms: u64,

    /// Where to write the raw body of each fetched page, if anywhere
    pub snapshot_path: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_attempts: 3,
            blocked_backoff_ms: 5000,
            retry_backoff_ms: 1000,
            snapshot_path: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Base directory for the JSONL file; probed from the environment when unset
    pub directory: Option<String>,

    /// Name of the append-only JSONL file
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filename: "all_offers.jsonl".to_string(),
        }
    }
}
