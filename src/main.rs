//! # guba_fetch
//!
//! Fetches every post published around a given date from a paginated,
//! newest-first forum listing, including each post's full text.
//!
//! ## Usage
//!
//! ```sh
//! guba_fetch -o ./out -t 600519@2024-01-10
//! ```
//!
//! ## Architecture
//!
//! For each (identifier, date) target:
//! 1. **Discovery**: read the total page count from page 1
//! 2. **Search**: binary-search the pages for the one holding the date
//! 3. **Window**: widen the hit by `window_radius` pages each side
//! 4. **Fetching**: stream every post in the window through a bounded pool of
//!    detail fetches (4 at a time by default), keeping listing order
//! 5. **Output**: write `{output_dir}/{identifier}.json`

use chrono::Local;
use clap::Parser;
use futures::StreamExt;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod detail;
mod error;
mod listing;
mod locator;
mod models;
mod orchestrator;
mod outputs;
mod source;
#[cfg(test)]
mod testing;
mod utils;

use cli::Cli;
use error::FetchError;
use models::{ItemBatch, Target, TIMESTAMP_FORMAT};
use orchestrator::FetchOrchestrator;
use outputs::json;
use source::ContentSource;
use source::http::HttpSource;
use utils::ensure_writable_dir;

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

    let start_time = Instant::now();
    info!("guba_fetch starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.output_dir, ?args.config, "Parsed CLI arguments");

    // ---- Load config ----
    let mut config = config::load(args.config.as_deref().map(Path::new))?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(radius) = args.window_radius {
        config.window_radius = radius;
    }
    config::validate(&config)?;
    info!(
        base_url = %config.base_url,
        workers = config.workers,
        window_radius = config.window_radius,
        "Loaded configuration"
    );

    let targets = args.all_targets()?;
    info!(count = targets.len(), "Targets to fetch");

    // Early check: ensure output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let source = Arc::new(HttpSource::new(config.user_agent.clone(), config.timeout()));
    let orchestrator = FetchOrchestrator::new(source, config.run_options());

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    for target in &targets {
        match fetch_target(&orchestrator, target, &args.output_dir).await {
            Ok(_) => succeeded += 1,
            Err(e) => {
                failed += 1;
                let page = e.downcast_ref::<FetchError>().and_then(FetchError::page);
                error!(%target, ?page, error = %e, "Run failed; moving to next identifier");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        succeeded,
        failed,
        "Execution complete"
    );

    Ok(())
}

/// Run one target to completion and write its items, returning the path
/// written.
///
/// Nothing is written when the run fails part-way. A failed write fails the
/// target too.
#[instrument(level = "info", skip_all, fields(target = %target))]
async fn fetch_target<S>(
    orchestrator: &FetchOrchestrator<S>,
    target: &Target,
    output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>>
where
    S: ContentSource + 'static,
    S::Session: 'static,
{
    let t0 = Instant::now();
    let (plan, mut outcomes) = orchestrator.run(target).await?;
    info!(
        boundary = plan.boundary,
        window = %plan.window,
        pages = plan.window.len(),
        "Fetching window"
    );

    let mut items = Vec::new();
    let mut fetched = 0usize;
    while let Some(outcome) = outcomes.next().await {
        let outcome = outcome?;
        if outcome.is_fetched() {
            fetched += 1;
        } else if let Some(reason) = outcome.failure() {
            debug!(url = %outcome.item.url, %reason, "Item kept without content");
        }
        items.push(outcome.into_item());
    }

    info!(
        items = items.len(),
        fetched,
        empty = items.len() - fetched,
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Fetched window"
    );

    let batch = ItemBatch {
        identifier: target.identifier.clone(),
        targetDate: target.date,
        fetchedAt: Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string(),
        items,
    };
    match json::write_batch(&batch, output_dir).await {
        Ok(path) => Ok(path),
        Err(e) => {
            error!(%output_dir, error = %e, "Failed to write JSON output");
            Err(e)
        }
    }
}
