//! Pitchfork album review parser.
//!
//! This module parses the listing pages under `/reviews/albums/` and the
//! individual review pages they link to. Pitchfork has shipped several
//! templates over the years; each field is located through an ordered list
//! of anchors (stable classes, `data-testid` attributes, `<time>` and
//! `<meta>` tags), and the first anchor that yields non-empty text wins.
//! Nothing depends on element position, so reordered layouts still parse.

use super::{ListingPage, ParseError, ReviewParser, parse_date, parse_score, resolve_href};
use crate::models::{ReviewMetadata, ReviewRecord, TrackReview};
use crate::utils::{clean_text, truncate_for_log};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

/// Where a field's value can be read from.
enum Anchor {
    /// Text content of the first matching element.
    Text(Selector),
    /// An attribute of the first matching element.
    Attr(Selector, &'static str),
}

fn text(css: &str) -> Anchor {
    Anchor::Text(Selector::parse(css).unwrap())
}

fn attr(css: &str, name: &'static str) -> Anchor {
    Anchor::Attr(Selector::parse(css).unwrap(), name)
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static REVIEW_LINKS: Lazy<Selector> = Lazy::new(|| {
    selector("a.review__link, a.summary-item__hed-link, a[data-testid='ReviewLink']")
});
static NEXT_PAGE: Lazy<Selector> =
    Lazy::new(|| selector("a[rel~='next'], link[rel~='next'], a.pagination__next"));

static ARTIST: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        text("[data-testid='ArtistName']"),
        text("h2.artist-links"),
        text(".artist-list"),
        text("div[class*='SplitScreenContentHeaderArtist']"),
    ]
});
static ALBUM: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        text("[data-testid='ContentHeaderHed']"),
        text("h1.review-title"),
        text("h1.single-album-tombstone__review-title"),
    ]
});
static SCORE: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        text("[data-testid='Rating']"),
        text("p.score"),
        text("span.score"),
        text("p[class*='Rating']"),
    ]
});
static BODY: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        text("[data-testid='BodyWrapper']"),
        text(".review-detail__text"),
        text("div.body__inner-container"),
    ]
});
static PUBLISHED: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        attr("time.pub-date", "datetime"),
        attr("meta[property='article:published_time']", "content"),
        attr("time[datetime]", "datetime"),
        text("time.pub-date"),
        text("[data-testid='ContentHeaderPublishDate']"),
    ]
});
static LABEL_YEAR: Lazy<Vec<Anchor>> = Lazy::new(|| {
    vec![
        text(".single-album-tombstone__meta-year"),
        text("[data-testid='LabelYear']"),
    ]
});
static GENRES: Lazy<Selector> =
    Lazy::new(|| selector(".genre-list__link, [data-testid='Genre']"));
static TRACK_ITEMS: Lazy<Selector> = Lazy::new(|| selector(".track-reviews .track-review"));
static TRACK_TITLE: Lazy<Selector> = Lazy::new(|| selector(".track-review__title"));
static TRACK_TEXT: Lazy<Selector> = Lazy::new(|| selector(".track-review__text"));
static LABEL_YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)\s*[•·|]\s*(\d{4})\b").unwrap());

fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// First non-empty value among `anchors`.
fn first_value(document: &Html, anchors: &[Anchor]) -> Option<String> {
    anchors.iter().find_map(|anchor| match anchor {
        Anchor::Text(sel) => document.select(sel).map(element_text).find(|t| !t.is_empty()),
        Anchor::Attr(sel, name) => document
            .select(sel)
            .filter_map(|e| e.value().attr(name))
            .map(clean_text)
            .find(|t| !t.is_empty()),
    })
}

fn required(document: &Html, anchors: &[Anchor], field: &'static str) -> Result<String, ParseError> {
    first_value(document, anchors).ok_or(ParseError::MissingField { field })
}

fn extract_artist(document: &Html) -> Result<String, ParseError> {
    required(document, &ARTIST, "artist")
}

fn extract_album(document: &Html) -> Result<String, ParseError> {
    required(document, &ALBUM, "album")
}

fn extract_score(document: &Html) -> Result<f64, ParseError> {
    let raw = required(document, &SCORE, "score")?;
    parse_score(&raw).inspect_err(|e| {
        warn!(
            raw = %truncate_for_log(&raw, 80),
            error = %e,
            "Unrecognized score text"
        )
    })
}

fn extract_body(document: &Html) -> Result<String, ParseError> {
    required(document, &BODY, "review_text")
}

fn extract_published_at(document: &Html) -> Result<chrono::NaiveDate, ParseError> {
    let raw = required(document, &PUBLISHED, "published_at")?;
    parse_date(&raw).ok_or_else(|| {
        warn!(raw = %truncate_for_log(&raw, 80), "Unrecognized publish date");
        ParseError::MalformedMarkup {
            field: "published_at",
            detail: format!("{raw:?}"),
        }
    })
}

fn extract_metadata(document: &Html) -> ReviewMetadata {
    let (label, release_year) = first_value(document, &LABEL_YEAR)
        .and_then(|line| {
            LABEL_YEAR_PATTERN.captures(&line).map(|caps| {
                let label = caps[1].trim().to_string();
                let label = (!label.is_empty()).then_some(label);
                (label, caps[2].parse().ok())
            })
        })
        .unwrap_or((None, None));

    let genres = document
        .select(&GENRES)
        .map(element_text)
        .filter(|g| !g.is_empty())
        .unique()
        .collect();

    ReviewMetadata {
        label,
        release_year,
        genres,
        tracks: extract_tracks(document),
    }
}

/// Track reviews in document order. Items without a title are skipped.
fn extract_tracks(document: &Html) -> Vec<TrackReview> {
    document
        .select(&TRACK_ITEMS)
        .filter_map(|item| {
            let title = item
                .select(&TRACK_TITLE)
                .map(element_text)
                .find(|t| !t.is_empty());
            let Some(title) = title else {
                debug!(item = %truncate_for_log(&item.html(), 120), "Skipping track review without a title");
                return None;
            };
            let text = item
                .select(&TRACK_TEXT)
                .map(element_text)
                .find(|t| !t.is_empty())
                .unwrap_or_default();
            Some(TrackReview { title, text })
        })
        .collect()
}

/// Parser for pitchfork.com album reviews.
#[derive(Debug, Clone, Copy, Default)]
pub struct PitchforkParser;

impl ReviewParser for PitchforkParser {
    #[instrument(level = "debug", skip_all, fields(page = %page_url))]
    fn parse_listing(&self, markup: &str, page_url: &Url) -> Result<ListingPage, ParseError> {
        let document = Html::parse_document(markup);

        let mut skipped = 0;
        let mut detail_urls = Vec::new();
        for link in document.select(&REVIEW_LINKS) {
            match link.value().attr("href").and_then(|h| resolve_href(page_url, h)) {
                Some(url) => detail_urls.push(url),
                None => {
                    skipped += 1;
                    debug!(entry = %truncate_for_log(&link.html(), 120), "Skipping malformed listing entry");
                }
            }
        }
        let detail_urls: Vec<String> = detail_urls.into_iter().unique().collect();

        let next_links: Vec<String> = document
            .select(&NEXT_PAGE)
            .filter_map(|e| e.value().attr("href"))
            .filter_map(|h| resolve_href(page_url, h))
            .unique()
            .collect();
        let next_page_url = match next_links.len() {
            0 | 1 => next_links.into_iter().next(),
            _ => {
                warn!(candidates = ?next_links, "Ambiguous next-page links");
                return Err(ParseError::MalformedMarkup {
                    field: "next_page",
                    detail: format!("{} distinct candidates", next_links.len()),
                });
            }
        };

        debug!(
            count = detail_urls.len(),
            skipped,
            next = ?next_page_url,
            "Parsed listing page"
        );
        Ok(ListingPage {
            detail_urls,
            next_page_url,
            skipped,
        })
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    fn parse_detail(&self, markup: &str, url: &str) -> Result<ReviewRecord, ParseError> {
        let document = Html::parse_document(markup);

        let artist = extract_artist(&document)?;
        let album = extract_album(&document)?;
        let score = extract_score(&document)?;
        let review_text = extract_body(&document)?;
        let published_at = extract_published_at(&document)?;
        let metadata = extract_metadata(&document);

        let record = ReviewRecord::new(artist, album, score, review_text, published_at, url)?
            .with_metadata(metadata);
        debug!(
            artist = record.artist(),
            album = record.album(),
            score = record.score(),
            bytes = record.review_text().len(),
            "Parsed review"
        );
        Ok(record)
    }
}
