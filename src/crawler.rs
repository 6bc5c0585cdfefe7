//! Drives a bounded crawl: listing pages, detail pages, scoring, aggregation.
//!
//! # Architecture
//!
//! The crawl is a loop over listing pages:
//! 1. **FetchingListing / ParsingListing**: fetch a listing page, extract
//!    detail URLs and the next-page link
//! 2. **FetchingDetail**: fetch detail pages, up to `concurrency` at a time
//!    under the fetcher's shared rate limit
//! 3. **ParsingDetail / Scoring / Aggregating**: parse each page, score the
//!    text, and add it to the dataset, in listing order
//!
//! The loop ends when there is no next page, the page limit is reached, a
//! review older than the date cutoff appears, a stop is requested, or a
//! listing page cannot be fetched or parsed. Detail-page failures are
//! tallied and skipped; nothing collected so far is ever discarded.
//!
//! All crawl state is owned by the [`Crawler`] and only mutated between
//! fetch batches, so concurrent fetches never touch it.

use crate::aggregator::{Aggregator, DatasetSummary};
use crate::config::CrawlConfig;
use crate::fetcher::{FetchError, FetchResult, PageSource};
use crate::models::ScoredReview;
use crate::scrapers::{ListingPage, ParseError, ReviewParser};
use crate::sentiment::SentimentAnalyzer;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlPhase {
    Idle,
    FetchingListing,
    ParsingListing,
    FetchingDetail,
    ParsingDetail,
    Scoring,
    Aggregating,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    NoNextPage,
    PageLimit,
    DateCutoff,
    Cancelled,
    ListingFailed,
}

/// Why a listing page ended the crawl.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ListingError {
    #[error("listing fetch failed: {0}")]
    Fetch(FetchError),
    #[error("listing parse failed: {0}")]
    Parse(ParseError),
    #[error("invalid listing URL {0:?}")]
    InvalidUrl(String),
}

/// Resumable progress of a crawl.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Detail URLs already attempted.
    pub visited: BTreeSet<String>,
    /// Listing pages processed, across resumed runs.
    pub pages_processed: u32,
    /// Detail pages that failed, across resumed runs.
    pub failures: u32,
    /// Next listing page to fetch; `None` once pagination has ended.
    pub cursor: Option<String>,
}

impl CrawlState {
    /// Whether this state comes from a run that already reached the end.
    pub fn is_exhausted(&self) -> bool {
        self.pages_processed > 0 && self.cursor.is_none()
    }
}

/// Running counts for one [`Crawler::run`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlStats {
    pub listing_pages: u32,
    /// Detail pages whose fetch completed (successfully or not).
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub duplicates: u32,
    /// Malformed listing entries skipped by the parser.
    pub skipped_entries: u32,
    /// Detail URLs skipped because an earlier run or page already had them.
    pub already_visited: u32,
    /// HTTP attempts across all fetches, retries included.
    pub fetch_attempts: u32,
    /// Fetches that needed more than one attempt.
    pub retried_fetches: u32,
    pub failures_by_kind: BTreeMap<String, u32>,
}

/// Cooperative cancellation flag, checked between batches and pages.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished (or stopped) crawl produced.
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// Collected reviews in export order (publish date, then URL).
    pub reviews: Vec<ScoredReview>,
    pub summary: DatasetSummary,
    pub stats: CrawlStats,
    pub stop_reason: StopReason,
    pub next_page_url: Option<String>,
    pub state: CrawlState,
    pub halted_by: Option<ListingError>,
}

enum BatchOutcome {
    Continue,
    CutoffReached,
    Cancelled,
}

pub struct Crawler<F, P> {
    source: F,
    parser: P,
    analyzer: SentimentAnalyzer,
    config: CrawlConfig,
    state: CrawlState,
    aggregator: Aggregator,
    stats: CrawlStats,
    phase: CrawlPhase,
    stop: StopHandle,
}

impl<F, P> Crawler<F, P>
where
    F: PageSource,
    P: ReviewParser,
{
    pub fn new(source: F, parser: P, analyzer: SentimentAnalyzer, config: CrawlConfig) -> Self {
        Self {
            source,
            parser,
            analyzer,
            config,
            state: CrawlState::default(),
            aggregator: Aggregator::new(),
            stats: CrawlStats::default(),
            phase: CrawlPhase::Idle,
            stop: StopHandle::default(),
        }
    }

    /// Continue from a checkpoint instead of the configured base URL.
    pub fn with_state(mut self, state: CrawlState) -> Self {
        self.state = state;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    fn enter(&mut self, phase: CrawlPhase) {
        debug!(from = ?self.phase, to = ?phase, "Phase transition");
        self.phase = phase;
    }

    fn record_failure(&mut self, kind: &'static str) {
        self.stats.failed += 1;
        self.state.failures += 1;
        *self.stats.failures_by_kind.entry(kind.to_string()).or_default() += 1;
    }

    fn record_attempts(&mut self, attempts: u32) {
        self.stats.fetch_attempts += attempts;
        if attempts > 1 {
            self.stats.retried_fetches += 1;
        }
    }

    /// Walk listing pages until a terminal condition, then report.
    #[instrument(level = "info", skip_all, fields(base_url = %self.config.base_url))]
    pub async fn run(&mut self) -> CrawlReport {
        let mut next = if self.state.pages_processed == 0 && self.state.cursor.is_none() {
            Some(self.config.base_url.to_string())
        } else {
            self.state.cursor.clone()
        };
        let mut pages_this_run = 0u32;
        let mut halted_by = None;

        let stop_reason = loop {
            let Some(page_url) = next.clone() else {
                break StopReason::NoNextPage;
            };
            if pages_this_run >= self.config.max_pages {
                break StopReason::PageLimit;
            }
            if self.stop.is_stopped() {
                break StopReason::Cancelled;
            }
            self.state.cursor = Some(page_url.clone());

            let listing = match self.fetch_listing(&page_url).await {
                Ok(listing) => listing,
                Err(e) => {
                    error!(url = %page_url, error = %e, "Listing page failed; ending crawl");
                    halted_by = Some(e);
                    break StopReason::ListingFailed;
                }
            };
            pages_this_run += 1;
            self.state.pages_processed += 1;
            self.stats.listing_pages += 1;
            self.stats.skipped_entries += listing.skipped as u32;
            info!(
                url = %page_url,
                reviews = listing.detail_urls.len(),
                skipped = listing.skipped,
                "Indexed listing page"
            );

            let outcome = self.process_details(listing.detail_urls).await;
            next = listing.next_page_url;
            self.state.cursor = next.clone();
            match outcome {
                BatchOutcome::Continue => {}
                BatchOutcome::CutoffReached => break StopReason::DateCutoff,
                BatchOutcome::Cancelled => break StopReason::Cancelled,
            }
        };

        self.enter(CrawlPhase::Done);
        info!(
            ?stop_reason,
            listing_pages = self.stats.listing_pages,
            processed = self.stats.processed,
            succeeded = self.stats.succeeded,
            failed = self.stats.failed,
            duplicates = self.stats.duplicates,
            failures_by_kind = ?self.stats.failures_by_kind,
            "Crawl finished"
        );

        CrawlReport {
            reviews: self.aggregator.sorted_snapshot(),
            summary: self.aggregator.summary(),
            stats: self.stats.clone(),
            stop_reason,
            next_page_url: next,
            state: self.state.clone(),
            halted_by,
        }
    }

    async fn fetch_listing(&mut self, page_url: &str) -> Result<ListingPage, ListingError> {
        let parsed_url =
            Url::parse(page_url).map_err(|_| ListingError::InvalidUrl(page_url.to_string()))?;

        self.enter(CrawlPhase::FetchingListing);
        let result = self.source.fetch(page_url).await;
        self.record_attempts(result.attempts());
        let markup = match result {
            FetchResult::Success { markup, .. } => markup,
            FetchResult::Failure { error, .. } => return Err(ListingError::Fetch(error)),
        };

        self.enter(CrawlPhase::ParsingListing);
        self.parser
            .parse_listing(&markup, &parsed_url)
            .map_err(ListingError::Parse)
    }

    async fn process_details(&mut self, urls: Vec<String>) -> BatchOutcome {
        let mut fresh = Vec::with_capacity(urls.len());
        for url in urls {
            if self.state.visited.contains(&url) || self.aggregator.contains_url(&url) {
                debug!(%url, "Already visited; skipping");
                self.stats.already_visited += 1;
            } else {
                fresh.push(url);
            }
        }

        let width = self.config.concurrency.max(1);
        for batch in fresh.chunks(width) {
            if self.stop.is_stopped() {
                info!("Stop requested; not starting further detail pages");
                return BatchOutcome::Cancelled;
            }
            self.state.visited.extend(batch.iter().cloned());

            self.enter(CrawlPhase::FetchingDetail);
            let source = &self.source;
            let results: Vec<FetchResult> = stream::iter(batch)
                .map(move |url| source.fetch(url))
                .buffered(width)
                .collect()
                .await;

            for result in results {
                if self.handle_detail(result) {
                    return BatchOutcome::CutoffReached;
                }
            }
        }
        BatchOutcome::Continue
    }

    /// Parse, score and aggregate one fetched detail page.
    ///
    /// Returns `true` when the review is older than the date cutoff.
    fn handle_detail(&mut self, result: FetchResult) -> bool {
        self.stats.processed += 1;
        self.record_attempts(result.attempts());

        let (markup, url, attempts) = match result {
            FetchResult::Success {
                markup,
                url,
                attempts,
                ..
            } => (markup, url, attempts),
            FetchResult::Failure {
                url,
                error,
                attempt_count,
            } => {
                warn!(%url, attempt_count, error = %error, "Detail fetch failed; skipping");
                self.record_failure(error.kind());
                return false;
            }
        };

        self.enter(CrawlPhase::ParsingDetail);
        let record = match self.parser.parse_detail(&markup, &url) {
            Ok(record) => record,
            Err(e) => {
                warn!(%url, error = %e, "Detail parse failed; skipping");
                self.record_failure(e.kind());
                return false;
            }
        };

        if let Some(cutoff) = self.config.date_cutoff {
            if record.published_at() < cutoff {
                info!(
                    %url,
                    published_at = %record.published_at(),
                    %cutoff,
                    "Reached date cutoff"
                );
                return true;
            }
        }

        self.enter(CrawlPhase::Scoring);
        let score = self.analyzer.analyze(record.review_text());
        let tracks = self.analyzer.analyze_tracks(&record.metadata().tracks);
        let track_count = tracks.len();

        self.enter(CrawlPhase::Aggregating);
        match self
            .aggregator
            .add_review(ScoredReview::new(record, score).with_tracks(tracks))
        {
            Ok(()) => {
                self.stats.succeeded += 1;
                info!(
                    %url,
                    attempts,
                    polarity = score.polarity(),
                    subjectivity = score.subjectivity(),
                    tracks = track_count,
                    "Collected review"
                );
            }
            Err(e) => {
                self.stats.duplicates += 1;
                warn!(error = %e, "Duplicate review; skipping");
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::pitchfork::PitchforkParser;
    use chrono::NaiveDate;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    const BASE: &str = "https://reviews.test/albums/";

    /// Canned responses per URL; the last response for a URL repeats.
    #[derive(Default)]
    struct FakeSite {
        pages: Mutex<HashMap<String, VecDeque<FetchResult>>>,
        calls: Mutex<Vec<String>>,
        stop_after: Option<(String, StopHandle)>,
    }

    impl FakeSite {
        fn page(self, url: &str, markup: String) -> Self {
            self.respond(
                url,
                FetchResult::Success {
                    markup,
                    url: url.to_string(),
                    status_code: 200,
                    attempts: 1,
                },
            )
        }

        fn respond(self, url: &str, result: FetchResult) -> Self {
            self.pages
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default()
                .push_back(result);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PageSource for &FakeSite {
        async fn fetch(&self, url: &str) -> FetchResult {
            self.calls.lock().unwrap().push(url.to_string());
            if let Some((trigger, handle)) = &self.stop_after {
                if trigger == url {
                    handle.stop();
                }
            }
            let mut pages = self.pages.lock().unwrap();
            match pages.get_mut(url) {
                Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
                Some(queue) => queue.front().cloned().unwrap(),
                None => FetchResult::Failure {
                    url: url.to_string(),
                    error: FetchError::Http4xx(404),
                    attempt_count: 1,
                },
            }
        }
    }

    fn url(slug: &str) -> String {
        format!("{BASE}{slug}/")
    }

    fn listing(slugs: &[&str], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for slug in slugs {
            html.push_str(&format!(r#"<a class="review__link" href="/albums/{slug}/">{slug}</a>"#));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a rel="next" href="{next}">Next</a>"#));
        }
        html.push_str("</body></html>");
        html
    }

    fn detail(artist: &str, album: &str, score: &str, date: &str, body: &str) -> String {
        format!(
            r#"<html><body>
                <h2 class="artist-links">{artist}</h2>
                <h1 class="review-title">{album}</h1>
                <p class="score">{score}</p>
                <time class="pub-date" datetime="{date}"></time>
                <div class="review-detail__text"><p>{body}</p></div>
            </body></html>"#
        )
    }

    fn config(max_pages: u32) -> CrawlConfig {
        let mut config = CrawlConfig::new(BASE).unwrap();
        config.max_pages = max_pages;
        config
    }

    fn crawler(site: &FakeSite, config: CrawlConfig) -> Crawler<&FakeSite, PitchforkParser> {
        Crawler::new(site, PitchforkParser, SentimentAnalyzer::default(), config)
    }

    fn three_review_site(next: Option<&str>) -> FakeSite {
        FakeSite::default()
            .page(BASE, listing(&["a", "b", "c"], next))
            .page(&url("a"), detail("A", "One", "8.5", "2016-03-01", "A brilliant record."))
            .page(&url("b"), detail("B", "Two", "4.0", "2016-02-01", "A dull, bland record."))
            .page(&url("c"), detail("C", "Three", "6,5", "2016-01-01", "A fine record."))
    }

    #[tokio::test]
    async fn test_single_listing_without_next_page() {
        let site = three_review_site(None);
        let mut crawler = crawler(&site, config(5));
        assert_eq!(crawler.phase(), CrawlPhase::Idle);

        let report = crawler.run().await;

        assert_eq!(crawler.phase(), CrawlPhase::Done);
        assert_eq!(report.stop_reason, StopReason::NoNextPage);
        assert_eq!(report.next_page_url, None);
        assert_eq!(report.stats.listing_pages, 1);
        assert_eq!(report.stats.processed, 3);
        assert_eq!(report.stats.succeeded, 3);
        assert_eq!(report.reviews.len(), 3);
        assert_eq!(site.calls().len(), 4);
        assert!(report.halted_by.is_none());

        // Export order is by publish date.
        let artists: Vec<_> = report.reviews.iter().map(|r| r.record.artist()).collect();
        assert_eq!(artists, vec!["C", "B", "A"]);
        assert!(report.reviews[2].sentiment.polarity() > 0.0);
        assert!(report.reviews[1].sentiment.polarity() < 0.0);
    }

    #[tokio::test]
    async fn test_track_reviews_are_scored_with_the_album() {
        let tracks = r#"<ul class="track-reviews">
            <li class="track-review"><b class="track-review__title">Hit</b>
                <span class="track-review__text">A gorgeous, stunning single.</span></li>
            <li class="track-review"><b class="track-review__title">Skit</b></li>
        </ul></body>"#;
        let page = detail("A", "One", "8.5", "2016-03-01", "A brilliant record.").replace("</body>", tracks);
        let site = FakeSite::default()
            .page(BASE, listing(&["a"], None))
            .page(&url("a"), page);

        let report = crawler(&site, config(1)).run().await;

        assert_eq!(report.stats.succeeded, 1);
        let review = &report.reviews[0];
        assert_eq!(review.record.metadata().tracks.len(), 2);
        let titles: Vec<_> = review.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Hit", "Skit"]);
        let hit = review.tracks[0].sentiment.unwrap();
        assert_eq!(hit, SentimentAnalyzer::default().analyze("A gorgeous, stunning single."));
        assert!(hit.polarity() > 0.0);
        assert_eq!(review.tracks[1].sentiment, None);
    }

    #[tokio::test]
    async fn test_detail_failures_are_tallied_and_skipped() {
        let site = FakeSite::default()
            .page(BASE, listing(&["ok", "gone", "noscore", "flaky"], None))
            .page(&url("ok"), detail("A", "One", "7.0", "2020-01-01", "Good."))
            .page(&url("noscore"), detail("B", "Two", "", "2020-01-01", "Good."))
            .respond(
                &url("flaky"),
                FetchResult::Failure {
                    url: url("flaky"),
                    error: FetchError::ExhaustedRetries {
                        attempts: 4,
                        last: Box::new(FetchError::Http5xx(503)),
                    },
                    attempt_count: 4,
                },
            );

        let report = crawler(&site, config(5)).run().await;

        assert_eq!(report.stop_reason, StopReason::NoNextPage);
        assert_eq!(report.stats.processed, 4);
        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.failed, 3);
        assert_eq!(report.stats.failures_by_kind["http_4xx"], 1);
        assert_eq!(report.stats.failures_by_kind["missing_field"], 1);
        assert_eq!(report.stats.failures_by_kind["exhausted_retries"], 1);
        assert_eq!(report.stats.fetch_attempts, 1 + 1 + 1 + 1 + 4);
        assert_eq!(report.stats.retried_fetches, 1);
        assert_eq!(report.state.failures, 3);
        assert_eq!(report.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_date_cutoff_stops_pagination() {
        let page2 = format!("{BASE}?page=2");
        let site = FakeSite::default()
            .page(BASE, listing(&["new", "newer-ish", "old", "older"], Some("?page=2")))
            .page(&url("new"), detail("A", "One", "7.0", "2015-03-01", "Good."))
            .page(&url("newer-ish"), detail("B", "Two", "7.0", "2015-01-01", "Good."))
            .page(&url("old"), detail("C", "Three", "7.0", "2014-12-31", "Good."))
            .page(&url("older"), detail("D", "Four", "7.0", "2014-06-01", "Good."))
            .page(&page2, listing(&["p2"], None));
        let mut config = config(5);
        config.date_cutoff = NaiveDate::from_ymd_opt(2015, 1, 1);

        let report = crawler(&site, config).run().await;

        assert_eq!(report.stop_reason, StopReason::DateCutoff);
        assert_eq!(report.reviews.len(), 2);
        assert_eq!(report.stats.processed, 3);
        let calls = site.calls();
        assert!(!calls.contains(&url("older")));
        assert!(!calls.contains(&page2));
    }

    #[tokio::test]
    async fn test_listing_failure_preserves_results() {
        let page2 = format!("{BASE}?page=2");
        let site = three_review_site(Some("?page=2")).respond(
            &page2,
            FetchResult::Failure {
                url: page2.clone(),
                error: FetchError::ExhaustedRetries {
                    attempts: 4,
                    last: Box::new(FetchError::Timeout),
                },
                attempt_count: 4,
            },
        );

        let report = crawler(&site, config(5)).run().await;

        assert_eq!(report.stop_reason, StopReason::ListingFailed);
        assert!(matches!(
            report.halted_by,
            Some(ListingError::Fetch(FetchError::ExhaustedRetries { .. }))
        ));
        assert_eq!(report.reviews.len(), 3);
        assert_eq!(report.state.cursor.as_deref(), Some(page2.as_str()));
    }

    #[tokio::test]
    async fn test_page_limit() {
        let page2 = format!("{BASE}?page=2");
        let page3 = format!("{BASE}?page=3");
        let site = FakeSite::default()
            .page(BASE, listing(&["a"], Some("?page=2")))
            .page(&page2, listing(&["b"], Some("?page=3")))
            .page(&url("a"), detail("A", "One", "7.0", "2020-01-02", "Good."))
            .page(&url("b"), detail("B", "Two", "7.0", "2020-01-01", "Good."));

        let report = crawler(&site, config(2)).run().await;

        assert_eq!(report.stop_reason, StopReason::PageLimit);
        assert_eq!(report.stats.listing_pages, 2);
        assert_eq!(report.next_page_url.as_deref(), Some(page3.as_str()));
        assert_eq!(report.state.cursor.as_deref(), Some(page3.as_str()));
        assert!(!site.calls().contains(&page3));
    }

    #[tokio::test]
    async fn test_duplicates_are_counted_not_fatal() {
        let site = FakeSite::default()
            .page(BASE, listing(&["a", "a-reissue"], None))
            .page(&url("a"), detail("A", "One", "7.0", "2020-01-01", "Good."))
            .page(&url("a-reissue"), detail("a", "one", "7.5", "2020-01-01", "Great."));

        let report = crawler(&site, config(5)).run().await;

        assert_eq!(report.stats.succeeded, 1);
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(report.reviews.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_before_run_returns_empty_report() {
        let site = three_review_site(None);
        let mut crawler = crawler(&site, config(5));
        crawler.stop_handle().stop();

        let report = crawler.run().await;

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert!(report.reviews.is_empty());
        assert!(site.calls().is_empty());
    }

    #[tokio::test]
    async fn test_stop_mid_run_keeps_in_flight_item() {
        let handle = StopHandle::default();
        let mut site = three_review_site(None);
        site.stop_after = Some((url("a"), handle.clone()));
        let mut crawler = crawler(&site, config(5));
        crawler.stop = handle;

        let report = crawler.run().await;

        assert_eq!(report.stop_reason, StopReason::Cancelled);
        assert_eq!(report.reviews.len(), 1);
        assert_eq!(report.reviews[0].record.artist(), "A");
        assert!(!site.calls().contains(&url("b")));
    }

    #[tokio::test]
    async fn test_resume_skips_visited_and_starts_at_cursor() {
        let page2 = format!("{BASE}?page=2");
        let site = FakeSite::default()
            .page(&page2, listing(&["a", "b"], None))
            .page(&url("a"), detail("A", "One", "7.0", "2020-01-02", "Good."))
            .page(&url("b"), detail("B", "Two", "7.0", "2020-01-01", "Good."));
        let state = CrawlState {
            visited: BTreeSet::from([url("a")]),
            pages_processed: 1,
            failures: 0,
            cursor: Some(page2.clone()),
        };

        let report = crawler(&site, config(5)).with_state(state).run().await;

        assert_eq!(site.calls(), vec![page2, url("b")]);
        assert_eq!(report.stats.already_visited, 1);
        assert_eq!(report.reviews.len(), 1);
        assert_eq!(report.state.pages_processed, 2);
        assert!(report.state.is_exhausted());
    }

    #[tokio::test]
    async fn test_exhausted_state_does_nothing() {
        let site = three_review_site(None);
        let state = CrawlState {
            pages_processed: 3,
            ..CrawlState::default()
        };
        let report = crawler(&site, config(5)).with_state(state).run().await;
        assert_eq!(report.stop_reason, StopReason::NoNextPage);
        assert!(site.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_fetches_give_same_dataset() {
        let site = three_review_site(None);
        let sequential = crawler(&site, config(5)).run().await;

        let site = three_review_site(None);
        let mut config = config(5);
        config.concurrency = 3;
        let concurrent = crawler(&site, config).run().await;

        assert_eq!(sequential.reviews, concurrent.reviews);
        assert_eq!(sequential.stats, concurrent.stats);
    }

    #[tokio::test]
    async fn test_ambiguous_pagination_halts() {
        let site = FakeSite::default().page(
            BASE,
            r#"<a rel="next" href="?page=2">2</a><a rel="next" href="?page=3">3</a>"#.to_string(),
        );
        let report = crawler(&site, config(5)).run().await;
        assert_eq!(report.stop_reason, StopReason::ListingFailed);
        assert!(matches!(report.halted_by, Some(ListingError::Parse(_))));
    }
}
