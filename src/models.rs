//! Data models for scraped reviews and their sentiment scores.
//!
//! This module defines the core data structures used throughout the crawl:
//! - [`ReviewRecord`]: One review as extracted from a detail page
//! - [`SentimentScore`]: Polarity and subjectivity computed from review text
//! - [`ScoredReview`]: A record paired with exactly one score
//!
//! Range invariants are checked at construction. Out-of-range values are
//! rejected with a [`ValidationError`], never clamped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest score a critic can give.
pub const SCORE_MIN: f64 = 0.0;
/// Highest score a critic can give.
pub const SCORE_MAX: f64 = 10.0;

/// Raised when a record or score is built from values outside their ranges.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
}

impl ValidationError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::OutOfRange { field, .. } | ValidationError::Empty { field } => field,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ValidationError> {
    // NaN fails both comparisons, so it is rejected here too.
    if value >= min && value <= max {
        Ok(value)
    } else {
        Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

fn check_non_empty(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Empty { field })
    } else {
        Ok(value)
    }
}

/// Optional album metadata found next to the review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewMetadata {
    /// Record label, when the page names one.
    pub label: Option<String>,
    /// Release year from the "Label • YYYY" line.
    pub release_year: Option<u16>,
    /// Genre tags in document order, without duplicates.
    pub genres: Vec<String>,
    /// Short reviews of individual tracks, when the page has them.
    #[serde(default)]
    pub tracks: Vec<TrackReview>,
}

/// A track singled out within an album review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackReview {
    pub title: String,
    /// May be empty when the page only names the track.
    pub text: String,
}

/// One album review as extracted from a detail page.
///
/// Fields are private so the only way to obtain a record is through
/// [`ReviewRecord::new`], which enforces the score range and non-empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawReviewRecord")]
pub struct ReviewRecord {
    artist: String,
    album: String,
    score: f64,
    review_text: String,
    published_at: NaiveDate,
    source_url: String,
    metadata: ReviewMetadata,
}

impl ReviewRecord {
    /// Build a validated record.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when `score` is outside `[0.0, 10.0]` or
    /// when artist, album, review text or source URL is blank.
    pub fn new(
        artist: impl Into<String>,
        album: impl Into<String>,
        score: f64,
        review_text: impl Into<String>,
        published_at: NaiveDate,
        source_url: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            artist: check_non_empty("artist", artist.into())?,
            album: check_non_empty("album", album.into())?,
            score: check_range("score", score, SCORE_MIN, SCORE_MAX)?,
            review_text: check_non_empty("review_text", review_text.into())?,
            published_at,
            source_url: check_non_empty("source_url", source_url.into())?,
            metadata: ReviewMetadata::default(),
        })
    }

    /// Attach album metadata.
    pub fn with_metadata(mut self, metadata: ReviewMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn review_text(&self) -> &str {
        &self.review_text
    }

    pub fn published_at(&self) -> NaiveDate {
        self.published_at
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn metadata(&self) -> &ReviewMetadata {
        &self.metadata
    }

    /// Natural key used for deduplication: artist, album and publish date.
    ///
    /// Artist and album are compared case-insensitively.
    pub fn natural_key(&self) -> (String, String, NaiveDate) {
        (
            self.artist.to_lowercase(),
            self.album.to_lowercase(),
            self.published_at,
        )
    }
}

#[derive(Deserialize)]
struct RawReviewRecord {
    artist: String,
    album: String,
    score: f64,
    review_text: String,
    published_at: NaiveDate,
    source_url: String,
    #[serde(default)]
    metadata: ReviewMetadata,
}

impl TryFrom<RawReviewRecord> for ReviewRecord {
    type Error = ValidationError;

    fn try_from(raw: RawReviewRecord) -> Result<Self, Self::Error> {
        Ok(ReviewRecord::new(
            raw.artist,
            raw.album,
            raw.score,
            raw.review_text,
            raw.published_at,
            raw.source_url,
        )?
        .with_metadata(raw.metadata))
    }
}

/// Sentiment of a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSentimentScore")]
pub struct SentimentScore {
    polarity: f64,
    subjectivity: f64,
}

impl SentimentScore {
    /// Build a validated score.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::OutOfRange`] when polarity is outside
    /// `[-1.0, 1.0]` or subjectivity is outside `[0.0, 1.0]`.
    pub fn new(polarity: f64, subjectivity: f64) -> Result<Self, ValidationError> {
        Ok(Self {
            polarity: check_range("polarity", polarity, -1.0, 1.0)?,
            subjectivity: check_range("subjectivity", subjectivity, 0.0, 1.0)?,
        })
    }

    /// Score from values the analyzer computed as means of in-range terms.
    ///
    /// Clamping only absorbs floating-point drift; scraped or user-supplied
    /// values go through [`SentimentScore::new`].
    pub(crate) fn from_bounded(polarity: f64, subjectivity: f64) -> Self {
        Self {
            polarity: polarity.clamp(-1.0, 1.0),
            subjectivity: subjectivity.clamp(0.0, 1.0),
        }
    }

    /// Negative (-1.0) to positive (1.0) valence.
    pub fn polarity(&self) -> f64 {
        self.polarity
    }

    /// Objective (0.0) to subjective (1.0).
    pub fn subjectivity(&self) -> f64 {
        self.subjectivity
    }

    /// Qualitative label for the polarity.
    pub fn assessment(&self) -> Assessment {
        Assessment::from_polarity(self.polarity)
    }
}

#[derive(Deserialize)]
struct RawSentimentScore {
    polarity: f64,
    subjectivity: f64,
}

impl TryFrom<RawSentimentScore> for SentimentScore {
    type Error = ValidationError;

    fn try_from(raw: RawSentimentScore) -> Result<Self, Self::Error> {
        SentimentScore::new(raw.polarity, raw.subjectivity)
    }
}

/// Coarse label for a polarity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Assessment {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

impl Assessment {
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity >= 0.6 {
            Assessment::VeryPositive
        } else if polarity >= 0.2 {
            Assessment::Positive
        } else if polarity > -0.2 {
            Assessment::Neutral
        } else if polarity > -0.6 {
            Assessment::Negative
        } else {
            Assessment::VeryNegative
        }
    }
}

/// Sentiment of one [`TrackReview`]; `None` when the track has no text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSentiment {
    pub title: String,
    pub sentiment: Option<SentimentScore>,
}

/// A review record with the sentiment computed from its text.
///
/// The score is attached next to the record rather than merged into it.
/// Per-track scores, if any, sit alongside it in the same order as
/// the record's [`ReviewMetadata::tracks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredReview {
    pub record: ReviewRecord,
    pub sentiment: SentimentScore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<TrackSentiment>,
}

impl ScoredReview {
    pub fn new(record: ReviewRecord, sentiment: SentimentScore) -> Self {
        Self {
            record,
            sentiment,
            tracks: Vec::new(),
        }
    }

    pub fn with_tracks(mut self, tracks: Vec<TrackSentiment>) -> Self {
        self.tracks = tracks;
        self
    }

    pub fn source_url(&self) -> &str {
        self.record.source_url()
    }
}
