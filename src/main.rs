//! # Realtor Agents
//!
//! A scraping pipeline that extracts structured real-estate-agent
//! records from a listing website: it discovers agent profile URLs from
//! paginated listing pages, fetches and parses each profile into a
//! normalized schema, optionally diffs the result against the previous
//! run, and exports the records in several formats.
//!
//! ## Features
//!
//! - Listing-page pagination walk with canonical-URL dedup
//! - Per-field partial-failure tolerance: a profile missing data still
//!   yields a record, with the unknowns left unknown
//! - Stable identity keys and deterministic content hashes, enabling
//!   new/updated/unchanged/missing classification across runs
//! - Bounded concurrent fetching with retry and backoff
//! - JSON, CSV, and XML export sinks
//!
//! ## Usage
//!
//! ```sh
//! realtor_agents "https://www.realtor.com/realestateagents/minneapolis_mn" \
//!     --formats json,csv --monitoring
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Discovery**: Walk listing pages, collecting agent profile URLs
//! 2. **Fetch + Parse**: Download each profile and extract raw fields (parallel)
//! 3. **Normalize**: Canonicalize fields, derive identities and content hashes
//! 4. **Track**: Diff the completed set against the persisted snapshot
//! 5. **Export**: Write the record set and diff report to the output sinks

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod discover;
mod error;
mod fetch;
mod models;
mod normalize;
mod outputs;
mod pipeline;
mod profile;
mod tracker;
mod utils;

use cli::Cli;
use config::Settings;
use fetch::HttpFetcher;
use utils::ensure_writable_dir;

#[tokio::main]
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
    info!("realtor_agents starting up");

    // Parse CLI and resolve settings
    let args = Cli::parse();
    debug!(?args.seeds, ?args.config, "Parsed CLI arguments");

    let settings = match Settings::load(args.config.as_deref()) {
        Ok(settings) => settings.apply_cli(&args),
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            return Err(e);
        }
    };

    // Early check: ensure the output dir is writable before spending
    // any fetches.
    if let Err(e) = ensure_writable_dir(&settings.output_dir).await {
        error!(
            path = %settings.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let fetcher = HttpFetcher::new(Duration::from_secs(settings.timeout_secs))?;

    // ---- Run the pipeline ----
    let output = match pipeline::run(&fetcher, &args.seeds, &settings).await {
        Ok(output) => output,
        Err(e) => {
            error!(error = %e, "Run failed");
            return Err(Box::new(e));
        }
    };

    let report = &output.report;
    info!(
        run_id = %report.run_id,
        discovered = report.discovered,
        processed = report.processed,
        skipped = report.skipped,
        malformed_pages = report.malformed_pages,
        "Scrape complete"
    );
    if output.diff.is_some() {
        info!(
            new = report.new,
            updated = report.updated,
            unchanged = report.unchanged,
            missing = report.missing,
            "Change detection complete"
        );
    }
    for skip in &output.skipped {
        warn!(url = %skip.url, reason = %skip.reason, "Skipped profile");
    }

    // ---- Export ----
    let written = outputs::export_all(
        &output.records,
        output.diff.as_ref(),
        &settings.output_dir,
        &settings.export_formats,
    )
    .await?;
    info!(files = written.len(), dir = %settings.output_dir, "Export complete");

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
