//! # Review Sentiment
//!
//! Crawls paginated album-review listings, extracts each review, scores the
//! review text for sentiment with a lexicon, and collects the results into a
//! deduplicated dataset for comparing critic scores with text sentiment.
//!
//! ## Pipeline
//!
//! 1. **Fetching** ([`fetcher`]): rate-limited HTTP with retries and backoff
//! 2. **Parsing** ([`scrapers`]): listing pages and review pages into typed records
//! 3. **Scoring** ([`sentiment`]): polarity and subjectivity from review text
//! 4. **Aggregation** ([`aggregator`]): dedupe and summarize
//! 5. **Orchestration** ([`crawler`]): the bounded crawl tying it together
//!
//! The binary in `main.rs` adds configuration, Ctrl-C handling and the
//! [`outputs`] written at the end of a run.

pub mod aggregator;
pub mod cli;
pub mod config;
pub mod crawler;
pub mod fetcher;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod sentiment;
pub mod utils;
