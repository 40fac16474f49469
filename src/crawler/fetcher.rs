//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the scraper, including:
//! - Building an HTTP client that presents browser-like headers
//! - GET requests with a bounded retry loop
//! - Error classification and backoff between attempts
//! - Optional raw-page snapshots for offline debugging

use crate::config::FetcherConfig;
use crate::crawler::PageSource;
use crate::ScraperError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use reqwest::{Client, StatusCode};
use std::path::PathBuf;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE_VALUE: &str = "pl-PL,pl;q=0.9,en-US;q=0.8,en;q=0.7";
const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const REFERER_VALUE: &str = "https://www.google.com/";

/// Retry behavior for a single page fetch
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Backoff base after 403/429; multiplied by the attempt number
    pub blocked_backoff: Duration,

    /// Backoff base after any other failure; multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            blocked_backoff: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            blocked_backoff: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        }
    }
}

/// Why a single attempt failed
#[derive(Debug)]
enum AttemptFailure {
    /// 403 or 429: the server is throttling us
    Blocked(StatusCode),

    /// Any other non-success status
    Status(StatusCode),

    /// Timeout, connection reset, DNS failure, body read error
    Network(reqwest::Error),
}

impl AttemptFailure {
    fn classify_status(status: StatusCode) -> Self {
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            Self::Blocked(status)
        } else {
            Self::Status(status)
        }
    }

    /// How long to wait before the next attempt
    fn backoff(&self, policy: &RetryPolicy, attempt: u32) -> Duration {
        match self {
            Self::Blocked(_) => policy.blocked_backoff * attempt,
            Self::Status(_) | Self::Network(_) => policy.retry_backoff * attempt,
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Blocked(status) => format!("blocked with HTTP {}", status.as_u16()),
            Self::Status(status) => format!("HTTP {}", status.as_u16()),
            Self::Network(e) if e.is_timeout() => format!("request timeout: {}", e),
            Self::Network(e) if e.is_connect() => format!("connection error: {}", e),
            Self::Network(e) => format!("network error: {}", e),
        }
    }
}

/// Builds an HTTP client carrying the browser-like default headers
///
/// Cookies are not stored, so every request starts without a session.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(REFERER, HeaderValue::from_static(REFERER_VALUE));

    Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher with retry and backoff
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    policy: RetryPolicy,
    snapshot_path: Option<PathBuf>,
}

impl Fetcher {
    /// Creates a fetcher with the default retry policy and the given request timeout
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            policy: RetryPolicy::default(),
            snapshot_path: None,
        })
    }

    /// Creates a fetcher from the `[fetcher]` configuration section
    pub fn from_config(config: &FetcherConfig) -> crate::Result<Self> {
        let fetcher = Self::new(Duration::from_secs(config.timeout_secs))?
            .with_policy(RetryPolicy {
                max_attempts: config.max_attempts,
                blocked_backoff: Duration::from_millis(config.blocked_backoff_ms),
                retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            });

        Ok(match &config.snapshot_path {
            Some(path) => fetcher.with_snapshot(path),
            None => fetcher,
        })
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Writes every successfully fetched body to `path`, overwriting it
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Fetches a URL and returns its body text
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | Return body immediately |
    /// | HTTP 403 / 429 | Wait `blocked_backoff * attempt`, retry |
    /// | Other HTTP error | Wait `retry_backoff * attempt`, retry |
    /// | Timeout / connection / DNS | Wait `retry_backoff * attempt`, retry |
    ///
    /// No wait follows the final attempt.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page body
    /// * `Err(ScraperError::FetchExhausted)` - Every attempt failed
    pub async fn fetch(&self, url: &str) -> crate::Result<String> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            match self.attempt(url).await {
                Ok(body) => {
                    self.write_snapshot(&body).await;
                    return Ok(body);
                }
                Err(failure) => {
                    last_failure = failure.describe();
                    tracing::warn!(
                        "Fetch of {} failed: {} (attempt {}/{})",
                        url,
                        last_failure,
                        attempt,
                        attempts
                    );

                    if attempt < attempts {
                        let wait = failure.backoff(&self.policy, attempt);
                        if !wait.is_zero() {
                            tracing::debug!("Backing off {:?} before retrying {}", wait, url);
                            tokio::time::sleep(wait).await;
                        }
                    }
                }
            }
        }

        Err(ScraperError::FetchExhausted {
            url: url.to_string(),
            attempts,
            reason: last_failure,
        })
    }

    /// Sends one GET request and reads the body
    async fn attempt(&self, url: &str) -> Result<String, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AttemptFailure::Network)?;

        let status = response.status();
        tracing::debug!("{} -> {}", url, status.as_u16());

        if !status.is_success() {
            return Err(AttemptFailure::classify_status(status));
        }

        response.text().await.map_err(AttemptFailure::Network)
    }

    /// Snapshots are a debugging aid; a failed write never fails the fetch
    async fn write_snapshot(&self, body: &str) {
        if let Some(path) = &self.snapshot_path {
            match tokio::fs::write(path, body).await {
                Ok(()) => tracing::debug!("Saved page snapshot to {}", path.display()),
                Err(e) => tracing::warn!("Failed to write snapshot {}: {}", path.display(), e),
            }
        }
    }
}

#[async_trait]
impl PageSource for Fetcher {
    async fn fetch_page(&self, url: &str) -> crate::Result<String> {
        self.fetch(url).await
    }
}
