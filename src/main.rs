//! # Review Sentiment
//!
//! Scrapes album reviews, scores their text for sentiment and writes the
//! dataset as JSON.
//!
//! ## Usage
//!
//! ```sh
//! review_sentiment -o ./reviews.json --max-pages 3 --checkpoint ./state.json
//! ```
//!
//! ## Run Outline
//!
//! 1. **Setup**: resolve CLI, environment and `--config` layers; load a
//!    custom lexicon and an earlier checkpoint if given
//! 2. **Crawl**: walk listing pages until a terminal condition or Ctrl-C
//! 3. **Output**: write the dataset and the checkpoint, partial or not

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use review_sentiment::cli::Cli;
use review_sentiment::config::CrawlConfig;
use review_sentiment::crawler::{Crawler, StopReason};
use review_sentiment::fetcher::Fetcher;
use review_sentiment::outputs::{checkpoint, json};
use review_sentiment::scrapers::pitchfork::PitchforkParser;
use review_sentiment::sentiment::SentimentAnalyzer;
use review_sentiment::sentiment::lexicon::Lexicon;
use review_sentiment::utils::ensure_writable_parent;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("review_sentiment starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = match CrawlConfig::resolve(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };
    info!(
        base_url = %config.base_url,
        max_pages = config.max_pages,
        date_cutoff = ?config.date_cutoff,
        concurrency = config.concurrency,
        retry_max = config.fetch.retry_max,
        "Resolved configuration"
    );

    // Fail before crawling if the outputs cannot be written
    let output = Path::new(&args.output);
    if let Err(e) = ensure_writable_parent(output).await {
        error!(path = %output.display(), error = %e, "Output directory is not writable");
        return Err(e);
    }
    let checkpoint_path = args.checkpoint.as_deref().map(Path::new);
    if let Some(path) = checkpoint_path {
        ensure_writable_parent(path).await?;
    }

    let analyzer = match &args.lexicon {
        Some(path) => {
            let lexicon = Lexicon::load(Path::new(path))?;
            info!(path, entries = lexicon.len(), "Loaded custom lexicon");
            SentimentAnalyzer::new(Arc::new(lexicon))
        }
        None => SentimentAnalyzer::default(),
    };

    let fetcher = Fetcher::from_config(&config.fetch)?;
    let mut crawler = Crawler::new(fetcher, PitchforkParser, analyzer, config);
    if let Some(path) = checkpoint_path {
        if let Some(state) = checkpoint::load(path).await? {
            if state.is_exhausted() {
                warn!("Checkpoint says pagination already ended; nothing new will be fetched");
            }
            crawler = crawler.with_state(state);
        }
    }

    // ---- Ctrl-C stops after the in-flight item ----
    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing in-flight work");
            stop.stop();
        }
    });

    let report = crawler.run().await;

    if let Some(e) = &report.halted_by {
        error!(error = %e, "Crawl ended early on a listing page; writing partial results");
    }
    if report.stop_reason == StopReason::Cancelled {
        warn!("Crawl cancelled; writing partial results");
    }

    json::write_dataset(output, &report.reviews, &report.summary).await?;
    if let Some(path) = checkpoint_path {
        checkpoint::save(path, &report.state).await?;
    }

    let summary = &report.summary;
    info!(
        reviews = summary.count,
        mean_score = ?summary.mean_score,
        mean_polarity = ?summary.mean_polarity,
        mean_subjectivity = ?summary.mean_subjectivity,
        correlation = ?summary.score_polarity_correlation,
        "Dataset summary"
    );
    for (kind, count) in &report.stats.failures_by_kind {
        info!(kind, count, "Failures by kind");
    }

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        stop_reason = ?report.stop_reason,
        next_page_url = ?report.next_page_url,
        "review_sentiment completed"
    );

    Ok(())
}
