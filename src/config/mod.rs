//! Configuration module for the scraper
//!
//! Settings come from built-in defaults, an optional TOML file, and the
//! `OTOMOTO_URL` environment variable (which always wins for the start URL).
//!
//! # Example
//!
//! ```no_run
//! use otomoto_scraper::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("scraper.toml")).unwrap();
//! println!("Crawling at most {} pages", config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, DEFAULT_START_URL, START_URL_ENV,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use validation::validate;
