//! Resolved run configuration.
//!
//! Values come from three layers, highest precedence first: command-line
//! flags (or their environment variables), an optional YAML file, and the
//! built-in defaults below. [`CrawlConfig::resolve`] merges the layers and
//! validates the result. A malformed base URL is the one configuration
//! problem that is fatal to the whole run.

use crate::cli::Cli;
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://pitchfork.com/reviews/albums/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("{field} must be at least 1")]
    ZeroLimit { field: &'static str },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl ConfigError {
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::InvalidBaseUrl { .. } => "invalid_base_url",
            ConfigError::ZeroLimit { .. } => "zero_limit",
            ConfigError::Read { .. } => "read",
            ConfigError::Parse { .. } => "parse",
            ConfigError::HttpClient(_) => "http_client",
        }
    }
}

/// Settings for the HTTP fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retries allowed after the first attempt.
    pub retry_max: u32,
    /// First backoff delay; doubles with each retry.
    pub backoff_base: Duration,
    /// Backoff cap, before jitter.
    pub backoff_max: Duration,
    /// Upper bound of the random jitter added to each backoff.
    pub jitter_max: Duration,
    /// Minimum spacing between any two requests.
    pub request_interval_min: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_max: 3,
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
            jitter_max: Duration::from_millis(250),
            request_interval_min: Duration::from_secs(1),
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!(
        "{}/{} (music review sentiment research)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

/// Settings for one bounded crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlConfig {
    /// First listing page.
    pub base_url: Url,
    /// Maximum listing pages to walk.
    pub max_pages: u32,
    /// Stop once a review older than this date is seen.
    pub date_cutoff: Option<NaiveDate>,
    /// Detail pages fetched at once.
    pub concurrency: usize,
    pub fetch: FetchConfig,
}

impl CrawlConfig {
    /// Config with defaults for everything but the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] for anything but an absolute
    /// http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            max_pages: 5,
            date_cutoff: None,
            concurrency: 1,
            fetch: FetchConfig::default(),
        })
    }

    /// Merge CLI flags over an optional YAML file over defaults.
    #[instrument(level = "info", skip_all)]
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(Path::new(path))?,
            None => FileConfig::default(),
        };
        debug!(?file, "Loaded file configuration");

        let base_url = cli
            .base_url
            .as_deref()
            .or(file.base_url.as_deref())
            .unwrap_or(DEFAULT_BASE_URL);
        let mut config = CrawlConfig::new(base_url)?;

        let defaults = FetchConfig::default();
        let millis = |cli: Option<u64>, file: Option<u64>, default: Duration| {
            cli.or(file).map(Duration::from_millis).unwrap_or(default)
        };

        config.max_pages = cli.max_pages.or(file.max_pages).unwrap_or(config.max_pages);
        config.date_cutoff = cli.date_cutoff.or(file.date_cutoff);
        config.concurrency = cli
            .concurrency
            .or(file.concurrency)
            .unwrap_or(config.concurrency);
        config.fetch = FetchConfig {
            timeout: millis(cli.timeout_ms, file.timeout_ms, defaults.timeout),
            retry_max: cli.retry_max.or(file.retry_max).unwrap_or(defaults.retry_max),
            backoff_base: millis(cli.backoff_base_ms, file.backoff_base_ms, defaults.backoff_base),
            backoff_max: millis(None, file.backoff_max_ms, defaults.backoff_max),
            jitter_max: millis(None, file.jitter_max_ms, defaults.jitter_max),
            request_interval_min: millis(
                cli.request_interval_ms,
                file.request_interval_ms,
                defaults.request_interval_min,
            ),
            user_agent: cli
                .user_agent
                .clone()
                .or(file.user_agent)
                .unwrap_or(defaults.user_agent),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_pages" });
        }
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "concurrency",
            });
        }
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Ok(url),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme {other:?}"))),
    }
}

/// Shape of the optional YAML config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub max_pages: Option<u32>,
    pub date_cutoff: Option<NaiveDate>,
    pub concurrency: Option<usize>,
    pub retry_max: Option<u32>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_max_ms: Option<u64>,
    pub jitter_max_ms: Option<u64>,
    pub request_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
    pub user_agent: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}
