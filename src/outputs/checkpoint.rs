//! Crawl checkpoints.
//!
//! A checkpoint is the [`CrawlState`] serialized as JSON. Loading a path
//! that does not exist yet is not an error, so the same `--checkpoint`
//! path works for the first run and every resumed one.

use crate::crawler::CrawlState;
use std::error::Error;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn save(path: &Path, state: &CrawlState) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(state)?;
    fs::write(path, json).await?;
    info!(
        visited = state.visited.len(),
        pages_processed = state.pages_processed,
        cursor = ?state.cursor,
        "Saved checkpoint"
    );
    Ok(())
}

/// Load a checkpoint, or `None` if the file does not exist.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load(path: &Path) -> Result<Option<CrawlState>, Box<dyn Error>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("No checkpoint yet; starting fresh");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    let state: CrawlState = serde_json::from_str(&raw)?;
    info!(
        visited = state.visited.len(),
        pages_processed = state.pages_processed,
        cursor = ?state.cursor,
        "Loaded checkpoint"
    );
    Ok(Some(state))
}
