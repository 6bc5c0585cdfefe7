//! Page fetching with rate limiting and exponential backoff.
//!
//! This module turns a URL into a [`FetchResult`]. Nothing here returns an
//! `Err` or panics past the [`PageSource`] boundary: every failure mode is
//! reported as [`FetchResult::Failure`] with a [`FetchError`] describing it.
//!
//! # Architecture
//!
//! The module uses a trait-based design so the crawl can be driven by a
//! fake source in tests:
//! - [`FetchOnce`]: a single HTTP attempt
//! - [`HttpClient`]: the `reqwest` implementation of [`FetchOnce`]
//! - [`RetryFetch`]: decorator adding the shared rate limit and retries to
//!   any [`FetchOnce`], exposed as a [`PageSource`]
//!
//! # Retry Strategy
//!
//! - Timeouts, connection errors, 5xx and 429 are retried
//! - 404 and other 4xx fail immediately
//! - Delay is `min(backoff_base * 2^(attempt-1), backoff_max) + jitter`

use crate::config::{ConfigError, FetchConfig};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter as GovernorLimiter};
use rand::{Rng, rng};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, instrument, warn};

/// Why a fetch did not produce markup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("client error: HTTP {0}")]
    Http4xx(u16),
    #[error("server error: HTTP {0}")]
    Http5xx(u16),
    #[error("rate limited: HTTP 429")]
    RateLimited,
    #[error("unexpected status: HTTP {0}")]
    UnknownStatus(u16),
    #[error("gave up after {attempts} attempts, last error: {last}")]
    ExhaustedRetries { attempts: u32, last: Box<FetchError> },
}

impl FetchError {
    /// Whether another attempt could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout
                | FetchError::Connection(_)
                | FetchError::Http5xx(_)
                | FetchError::RateLimited
        )
    }

    /// Stable label used in failure tallies.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Connection(_) => "connection",
            FetchError::Http4xx(_) => "http_4xx",
            FetchError::Http5xx(_) => "http_5xx",
            FetchError::RateLimited => "rate_limited",
            FetchError::UnknownStatus(_) => "unknown_status",
            FetchError::ExhaustedRetries { .. } => "exhausted_retries",
        }
    }

    /// Map an HTTP status to success (`None`) or the failure it represents.
    pub fn from_status(code: u16) -> Option<FetchError> {
        match code {
            200..=399 => None,
            429 => Some(FetchError::RateLimited),
            400..=499 => Some(FetchError::Http4xx(code)),
            500..=599 => Some(FetchError::Http5xx(code)),
            _ => Some(FetchError::UnknownStatus(code)),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Connection(e.to_string())
        }
    }
}

/// Outcome of fetching one URL, including how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchResult {
    Success {
        markup: String,
        url: String,
        status_code: u16,
        attempts: u32,
    },
    Failure {
        url: String,
        error: FetchError,
        attempt_count: u32,
    },
}

impl FetchResult {
    pub fn url(&self) -> &str {
        match self {
            FetchResult::Success { url, .. } | FetchResult::Failure { url, .. } => url,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            FetchResult::Success { attempts, .. } => *attempts,
            FetchResult::Failure { attempt_count, .. } => *attempt_count,
        }
    }
}

/// Anything that can turn a URL into a [`FetchResult`].
///
/// The crawler only depends on this trait, so tests can substitute canned
/// pages for the network.
pub trait PageSource {
    async fn fetch(&self, url: &str) -> FetchResult;
}

/// Markup and status of a successful single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub markup: String,
    pub status_code: u16,
}

/// A single request, with no retries or pacing.
pub trait FetchOnce {
    async fn fetch_once(&self, url: &str) -> Result<Page, FetchError>;
}

/// `reqwest`-backed [`FetchOnce`] that issues plain GET requests.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build a client with the configured timeout and `User-Agent`.
    pub fn new(config: &FetchConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { client })
    }
}

impl FetchOnce for HttpClient {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn fetch_once(&self, url: &str) -> Result<Page, FetchError> {
        let t0 = Instant::now();
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;
        let status_code = response.status().as_u16();
        debug!(
            status_code,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Received response"
        );

        if let Some(e) = FetchError::from_status(status_code) {
            return Err(e);
        }
        let markup = response.text().await?;
        Ok(Page {
            markup,
            status_code,
        })
    }
}

/// Enforces a minimum interval between request starts.
///
/// Backed by a `governor` limiter with a quota of one request per
/// `min_interval` and no burst. Clones share the same limiter, so every
/// fetcher built from one `RateLimiter` (and every concurrent call on one
/// fetcher) is paced by a single clock. A zero interval disables pacing.
#[derive(Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    inner: Option<Arc<DefaultDirectRateLimiter>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        let inner = Quota::with_period(min_interval)
            .map(|quota| Arc::new(GovernorLimiter::direct(quota.allow_burst(NonZeroU32::MIN))));
        Self {
            min_interval,
            inner,
        }
    }

    /// Wait until a request may start, then claim that slot.
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.inner {
            limiter.until_ready().await;
        }
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .finish()
    }
}

/// Decorator that adds rate limiting and retries to any [`FetchOnce`].
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(backoff_base * 2^(attempt-1), backoff_max) + random_jitter(0..=jitter_max)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    limiter: RateLimiter,
    retry_max: u32,
    backoff_base: Duration,
    backoff_max: Duration,
    jitter_max: Duration,
}

/// The production fetcher.
pub type Fetcher = RetryFetch<HttpClient>;

impl Fetcher {
    /// Build an HTTP fetcher with its own rate-limit clock.
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        Ok(RetryFetch::new(
            HttpClient::new(config)?,
            RateLimiter::new(config.request_interval_min),
            config,
        ))
    }
}

impl<T> RetryFetch<T>
where
    T: FetchOnce,
{
    pub fn new(inner: T, limiter: RateLimiter, config: &FetchConfig) -> Self {
        Self {
            inner,
            limiter,
            retry_max: config.retry_max,
            backoff_base: config.backoff_base,
            backoff_max: config.backoff_max,
            jitter_max: config.jitter_max,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.backoff_base.saturating_mul(factor).min(self.backoff_max);
        let jitter_ms = self.jitter_max.as_millis() as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rng().random_range(0..=jitter_ms))
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("retry_max", &self.retry_max)
            .field("backoff_base", &self.backoff_base)
            .field("backoff_max", &self.backoff_max)
            .field("jitter_max", &self.jitter_max)
            .finish()
    }
}

impl<T> PageSource for RetryFetch<T>
where
    T: FetchOnce,
{
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn fetch(&self, url: &str) -> FetchResult {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            self.limiter.acquire().await;
            attempt += 1;

            let e = match self.inner.fetch_once(url).await {
                Ok(page) => {
                    debug!(attempt, status_code = page.status_code, "Fetched page");
                    return FetchResult::Success {
                        markup: page.markup,
                        url: url.to_string(),
                        status_code: page.status_code,
                        attempts: attempt,
                    };
                }
                Err(e) => e,
            };

            if !e.is_retryable() {
                warn!(attempt, error = %e, "fetch failed; not retryable");
                return FetchResult::Failure {
                    url: url.to_string(),
                    error: e,
                    attempt_count: attempt,
                };
            }

            if attempt > self.retry_max {
                error!(
                    attempt,
                    max = self.retry_max,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %e,
                    "fetch exhausted retries"
                );
                return FetchResult::Failure {
                    url: url.to_string(),
                    error: FetchError::ExhaustedRetries {
                        attempts: attempt,
                        last: Box::new(e),
                    },
                    attempt_count: attempt,
                };
            }

            let delay = self.backoff(attempt);
            warn!(
                attempt,
                max = self.retry_max,
                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %e,
                "fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}
