//! YAML configuration for the fetcher.
//!
//! Every field has a default, so a missing file (or an empty one) yields a
//! working configuration pointed at the public site.

use crate::error::ConfigError;
use crate::listing::ListingOptions;
use crate::orchestrator::RunOptions;
use crate::source::parse_selector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://guba.eastmoney.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

/// Root configuration, mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Detail fetches in flight at once. Memory grows roughly linearly with it.
    pub workers: usize,
    /// Extra pages fetched on each side of the boundary page.
    pub window_radius: u32,
    /// Upper bound on one page load, listing or detail.
    pub timeout_secs: u64,
    pub discovery_retries: usize,
    pub retry_base_delay_ms: u64,
    pub retry_jitter_ms: u64,
    pub detail_selector: String,
    pub pager_selector: String,
    pub payload_variable: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: 4,
            window_radius: 1,
            timeout_secs: 20,
            discovery_retries: 3,
            retry_base_delay_ms: 1000,
            retry_jitter_ms: 250,
            detail_selector: ".newstext".to_string(),
            pager_selector: "ul.paging li".to_string(),
            payload_variable: "article_list".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn listing_options(&self) -> ListingOptions {
        ListingOptions {
            payload_variable: self.payload_variable.clone(),
            pager_selector: self.pager_selector.clone(),
            discovery_retries: self.discovery_retries,
            retry_base_delay: Duration::from_millis(self.retry_base_delay_ms),
            retry_jitter: Duration::from_millis(self.retry_jitter_ms),
        }
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            base_url: self.base_url.clone(),
            workers: self.workers,
            window_radius: self.window_radius,
            detail_selector: self.detail_selector.clone(),
            listing: self.listing_options(),
        }
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, the defaults are used.
pub fn load(path: Option<&Path>) -> Result<FetchConfig, ConfigError> {
    let cfg = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                FetchConfig::default()
            } else {
                serde_yaml::from_str(&content)?
            }
        }
        None => FetchConfig::default(),
    };
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &FetchConfig) -> Result<(), ConfigError> {
    if cfg.workers == 0 {
        return Err(ConfigError::Invalid("workers must be > 0".into()));
    }
    if cfg.timeout_secs == 0 {
        return Err(ConfigError::Invalid("timeout_secs must be > 0".into()));
    }
    Url::parse(&cfg.base_url).map_err(|e| ConfigError::Invalid(format!("base_url `{}`: {e}", cfg.base_url)))?;
    for selector in [&cfg.detail_selector, &cfg.pager_selector] {
        parse_selector(selector).map_err(|e| ConfigError::Invalid(e.to_string()))?;
    }
    if cfg.payload_variable.trim().is_empty() {
        return Err(ConfigError::Invalid("payload_variable must be non-empty".into()));
    }
    Ok(())
}
