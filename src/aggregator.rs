//! Accumulates scored reviews into one deduplicated dataset.
//!
//! Reviews are kept in insertion order next to two indexes: one on
//! `source_url` and one on the natural key (artist, album, publish date).
//! Both give O(1) duplicate checks. A duplicate is reported as a
//! [`DuplicateError`] for the caller to log and skip; the dataset is left
//! untouched.

use crate::models::{ReviewRecord, ScoredReview, SentimentScore};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuplicateError {
    #[error("{source_url} is already in the dataset")]
    SourceUrl { source_url: String },
    #[error("{source_url} repeats {existing_url} (same artist, album and publish date)")]
    NaturalKey {
        source_url: String,
        existing_url: String,
    },
}

impl DuplicateError {
    pub fn source_url(&self) -> &str {
        match self {
            DuplicateError::SourceUrl { source_url } | DuplicateError::NaturalKey { source_url, .. } => {
                source_url
            }
        }
    }
}

type NaturalKey = (String, String, NaiveDate);

#[derive(Debug, Default)]
pub struct Aggregator {
    reviews: Vec<ScoredReview>,
    urls: HashSet<String>,
    keys: HashMap<NaturalKey, String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record with its score, rejecting duplicates.
    pub fn add(&mut self, record: ReviewRecord, score: SentimentScore) -> Result<(), DuplicateError> {
        self.add_review(ScoredReview::new(record, score))
    }

    /// Add an already scored review, track scores included.
    pub fn add_review(&mut self, review: ScoredReview) -> Result<(), DuplicateError> {
        let record = &review.record;
        if self.urls.contains(record.source_url()) {
            return Err(DuplicateError::SourceUrl {
                source_url: record.source_url().to_string(),
            });
        }
        let key = record.natural_key();
        if let Some(existing) = self.keys.get(&key) {
            return Err(DuplicateError::NaturalKey {
                source_url: record.source_url().to_string(),
                existing_url: existing.clone(),
            });
        }

        self.urls.insert(record.source_url().to_string());
        self.keys.insert(key, record.source_url().to_string());
        self.reviews.push(review);
        Ok(())
    }

    /// Current contents in insertion order.
    pub fn snapshot(&self) -> &[ScoredReview] {
        &self.reviews
    }

    /// Current contents in export order: by publish date, then source URL.
    ///
    /// Unlike insertion order this does not depend on which concurrent
    /// fetch finished first.
    pub fn sorted_snapshot(&self) -> Vec<ScoredReview> {
        let mut reviews = self.reviews.clone();
        reviews.sort_by(|a, b| {
            a.record
                .published_at()
                .cmp(&b.record.published_at())
                .then_with(|| a.source_url().cmp(b.source_url()))
        });
        reviews
    }

    pub fn size(&self) -> usize {
        self.reviews.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }

    pub fn contains_url(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    /// Aggregate statistics over the dataset.
    pub fn summary(&self) -> DatasetSummary {
        DatasetSummary::from_reviews(&self.sorted_snapshot())
    }
}

/// One review singled out in a [`DatasetSummary`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewHighlight {
    pub artist: String,
    pub album: String,
    pub score: f64,
    pub polarity: f64,
    pub source_url: String,
}

impl From<&ScoredReview> for ReviewHighlight {
    fn from(review: &ScoredReview) -> Self {
        Self {
            artist: review.record.artist().to_string(),
            album: review.record.album().to_string(),
            score: review.record.score(),
            polarity: review.sentiment.polarity(),
            source_url: review.source_url().to_string(),
        }
    }
}

/// How text sentiment lines up with critic scores across a dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub count: usize,
    pub mean_score: Option<f64>,
    pub mean_polarity: Option<f64>,
    pub mean_subjectivity: Option<f64>,
    /// Pearson correlation of critic score against polarity.
    pub score_polarity_correlation: Option<f64>,
    pub most_positive: Option<ReviewHighlight>,
    pub most_negative: Option<ReviewHighlight>,
}

impl DatasetSummary {
    /// Summarize `reviews`; ties for most positive/negative go to the
    /// earliest review in the given order.
    pub fn from_reviews(reviews: &[ScoredReview]) -> Self {
        let scores: Vec<f64> = reviews.iter().map(|r| r.record.score()).collect();
        let polarities: Vec<f64> = reviews.iter().map(|r| r.sentiment.polarity()).collect();
        let subjectivities: Vec<f64> = reviews.iter().map(|r| r.sentiment.subjectivity()).collect();

        let mut most_positive: Option<&ScoredReview> = None;
        let mut most_negative: Option<&ScoredReview> = None;
        for review in reviews {
            let p = review.sentiment.polarity();
            if most_positive.is_none_or(|best| p > best.sentiment.polarity()) {
                most_positive = Some(review);
            }
            if most_negative.is_none_or(|worst| p < worst.sentiment.polarity()) {
                most_negative = Some(review);
            }
        }

        Self {
            count: reviews.len(),
            mean_score: mean(&scores),
            mean_polarity: mean(&polarities),
            mean_subjectivity: mean(&subjectivities),
            score_polarity_correlation: pearson(&scores, &polarities),
            most_positive: most_positive.map(ReviewHighlight::from),
            most_negative: most_negative.map(ReviewHighlight::from),
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let (mx, my) = (mean(xs)?, mean(ys)?);
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some((cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0))
}
