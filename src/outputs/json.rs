//! JSON export of the scored dataset.
//!
//! The document holds a generation timestamp, the [`DatasetSummary`] and
//! the reviews in the order they are given (export order from
//! [`Aggregator::sorted_snapshot`](crate::aggregator::Aggregator::sorted_snapshot)).
//! Every review field is written at full precision, so the file reads back
//! into identical [`ScoredReview`] values.

use crate::aggregator::DatasetSummary;
use crate::models::ScoredReview;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Serialize)]
struct DatasetRef<'a> {
    generated_at: DateTime<Utc>,
    summary: &'a DatasetSummary,
    reviews: &'a [ScoredReview],
}

/// Reviews as read back from an exported file.
#[derive(Debug, Deserialize)]
pub struct ExportedDataset {
    pub generated_at: DateTime<Utc>,
    pub reviews: Vec<ScoredReview>,
}

/// Write `reviews` and `summary` to `path` as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails. The parent
/// directory must already exist.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = reviews.len()))]
pub async fn write_dataset(
    path: &Path,
    reviews: &[ScoredReview],
    summary: &DatasetSummary,
) -> Result<(), Box<dyn Error>> {
    let document = DatasetRef {
        generated_at: Utc::now(),
        summary,
        reviews,
    };
    let json = serde_json::to_string_pretty(&document)?;

    if let Err(e) = fs::write(path, json).await {
        error!(error = %e, "Failed to write dataset");
        return Err(e.into());
    }
    info!("Wrote dataset");
    Ok(())
}

/// Read a file produced by [`write_dataset`].
pub async fn read_dataset(path: &Path) -> Result<ExportedDataset, Box<dyn Error>> {
    let raw = fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}
