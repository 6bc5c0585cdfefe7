//! Review page parsers.
//!
//! A parser turns fetched markup into typed values. Each site gets its own
//! submodule implementing [`ReviewParser`]; the crawler only sees the trait.
//! Site modules keep their selectors behind one extraction function per
//! field, so a template change touches one function.
//!
//! # Supported Sources
//!
//! | Source | Module | Notes |
//! |--------|--------|-------|
//! | Pitchfork album reviews | [`pitchfork`] | Current and legacy templates |
//!
//! # Common Patterns
//!
//! Each parser provides:
//! - `parse_listing(markup, page_url)`: detail URLs and the next-page link
//! - `parse_detail(markup, url)`: one [`ReviewRecord`]
//!
//! Shared normalization lives here: score text ([`parse_score`]), publish
//! dates ([`parse_date`]) and link resolution ([`resolve_href`]).

pub mod pitchfork;

use crate::models::{ReviewRecord, SCORE_MAX, SCORE_MIN, ValidationError};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("required field {field} not found")]
    MissingField { field: &'static str },
    #[error("score {raw:?} parses to {value}, outside [0.0, 10.0]")]
    ScoreOutOfRange { raw: String, value: f64 },
    #[error("unrecognized {field}: {detail}")]
    MalformedMarkup { field: &'static str, detail: String },
    #[error("extracted record is invalid: {0}")]
    Validation(#[from] ValidationError),
}

impl ParseError {
    /// Stable label used in failure tallies.
    pub fn kind(&self) -> &'static str {
        match self {
            ParseError::MissingField { .. } => "missing_field",
            ParseError::ScoreOutOfRange { .. } => "score_out_of_range",
            ParseError::MalformedMarkup { .. } => "malformed_markup",
            ParseError::Validation(_) => "validation",
        }
    }
}

/// What a listing page links to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    /// Absolute detail URLs in page order, without duplicates.
    pub detail_urls: Vec<String>,
    /// Absolute URL of the next listing page; `None` ends pagination.
    pub next_page_url: Option<String>,
    /// Review entries dropped because their link was missing or unusable.
    pub skipped: usize,
}

/// Site-specific extraction of listings and reviews.
pub trait ReviewParser {
    /// Extract detail links and the next-page link.
    ///
    /// Malformed entries are skipped and counted. The only error is an
    /// ambiguous next-page link, which fails the page rather than guessing.
    fn parse_listing(&self, markup: &str, page_url: &Url) -> Result<ListingPage, ParseError>;

    /// Extract one review from a detail page.
    fn parse_detail(&self, markup: &str, url: &str) -> Result<ReviewRecord, ParseError>;
}

static SCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d{1,2}(?:[.,]\d+)?)\s*(?:/\s*(\d{1,2}(?:[.,]\d+)?))?\s*$").unwrap()
});

fn decimal(raw: &str) -> Option<f64> {
    raw.replace(',', ".").parse().ok()
}

/// Normalize score text to a single value in `[0.0, 10.0]`.
///
/// Accepts `"8.5"`, `"8,5"` and `"8.5 / 10.0"`. Anything else, including a
/// scale other than 10, is a [`ParseError::MalformedMarkup`].
pub fn parse_score(raw: &str) -> Result<f64, ParseError> {
    let malformed = || ParseError::MalformedMarkup {
        field: "score",
        detail: format!("{raw:?}"),
    };
    let caps = SCORE.captures(raw).ok_or_else(malformed)?;
    if let Some(scale) = caps.get(2) {
        if decimal(scale.as_str()) != Some(SCORE_MAX) {
            return Err(malformed());
        }
    }
    let value = decimal(&caps[1]).ok_or_else(malformed)?;
    if !(SCORE_MIN..=SCORE_MAX).contains(&value) {
        return Err(ParseError::ScoreOutOfRange {
            raw: raw.trim().to_string(),
            value,
        });
    }
    Ok(value)
}

/// Parse a publish date from a `datetime` attribute, meta tag or byline.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y"]
        .into_iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Resolve an `href` against the page it appeared on.
///
/// Returns `None` for fragments, `javascript:`/`mailto:` links and anything
/// that does not end up as an http(s) URL.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut resolved = base.join(href).ok()?;
    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
