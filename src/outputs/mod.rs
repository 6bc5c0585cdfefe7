//! Files written at the end of a run.
//!
//! # Submodules
//!
//! - [`json`]: Writes the scored dataset with its summary statistics
//! - [`checkpoint`]: Saves and restores [`CrawlState`](crate::crawler::CrawlState)
//!   so an interrupted crawl can resume
//!
//! # Output Structure
//!
//! ```text
//! reviews.json
//! ├── generated_at   # RFC 3339, UTC
//! ├── summary        # DatasetSummary
//! └── reviews        # [{ record, sentiment }] by publish date, then URL
//!
//! checkpoint.json
//! ├── visited
//! ├── pages_processed
//! ├── failures
//! └── cursor
//! ```

pub mod checkpoint;
pub mod json;
