//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Crawl settings can be provided via command-line flags, environment
//! variables, or a YAML file passed with `--config`.

use chrono::NaiveDate;
use clap::Parser;

/// Command-line arguments for the review crawler.
///
/// Crawl options are left as `Option` so that a config file can fill in
/// whatever the command line does not set. See
/// [`CrawlConfig::resolve`](crate::config::CrawlConfig::resolve).
///
/// # Examples
///
/// ```sh
/// # Walk three listing pages and write the scored dataset
/// review_sentiment -o ./reviews.json --max-pages 3
///
/// # Stop at reviews published before 2015 and keep a resumable checkpoint
/// review_sentiment -o ./reviews.json --date-cutoff 2015-01-01 --checkpoint ./state.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output path for the scored dataset (JSON)
    #[arg(short, long, env = "REVIEWS_OUTPUT")]
    pub output: String,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<String>,

    /// First listing page to crawl
    #[arg(long, env = "REVIEWS_BASE_URL")]
    pub base_url: Option<String>,

    /// Maximum number of listing pages to walk
    #[arg(long, env = "REVIEWS_MAX_PAGES")]
    pub max_pages: Option<u32>,

    /// Stop at the first review published before this date (YYYY-MM-DD)
    #[arg(long, env = "REVIEWS_DATE_CUTOFF")]
    pub date_cutoff: Option<NaiveDate>,

    /// Number of detail pages fetched concurrently
    #[arg(long, env = "REVIEWS_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Retries allowed per request after the first attempt
    #[arg(long, env = "REVIEWS_RETRY_MAX")]
    pub retry_max: Option<u32>,

    /// Initial retry backoff in milliseconds (doubles per retry)
    #[arg(long, env = "REVIEWS_BACKOFF_BASE_MS")]
    pub backoff_base_ms: Option<u64>,

    /// Minimum milliseconds between any two requests
    #[arg(long, env = "REVIEWS_REQUEST_INTERVAL_MS")]
    pub request_interval_ms: Option<u64>,

    /// Per-request timeout in milliseconds
    #[arg(long, env = "REVIEWS_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long, env = "REVIEWS_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Tab-separated lexicon file replacing the built-in word table
    #[arg(long, env = "REVIEWS_LEXICON")]
    pub lexicon: Option<String>,

    /// Crawl checkpoint to resume from; rewritten when the run ends
    #[arg(long, env = "REVIEWS_CHECKPOINT")]
    pub checkpoint: Option<String>,
}
