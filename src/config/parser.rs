use crate::config::types::{Config, START_URL_ENV};
use crate::config::validation::validate;
use crate::{ConfigError, ConfigResult};
use sha2::{Digest, Sha256};
use std::path::Path;

impl Config {
    /// Builds a configuration from defaults plus the environment
    ///
    /// This is what a zero-argument invocation uses.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Config::default();
        config.apply_env_overrides();
        validate(&config)?;
        Ok(config)
    }

    /// Applies `OTOMOTO_URL` to the start URL when it is set and non-empty
    pub fn apply_env_overrides(&mut self) {
        self.apply_start_url_override(std::env::var(START_URL_ENV).ok());
    }

    fn apply_start_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()) {
            if !url.is_empty() {
                self.crawler.start_url = url;
            }
        }
    }
}

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;
    config.apply_env_overrides();

    validate(&config)?;

    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so saved snapshots can be tied back to the settings
/// that produced them.
pub fn compute_config_hash(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> ConfigResult<(Config, String)> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
