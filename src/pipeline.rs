//! Run orchestration: discovery, the worker pool, accumulation, and the
//! once-per-run diff.
//!
//! Discovery is drained eagerly, then profile URLs stream through a
//! bounded pool of fetch-parse-normalize tasks
//! (`buffer_unordered(concurrency)`). Each profile is owned by exactly
//! one task from fetch to normalized record; only the final accumulation
//! happens in the collecting task, so nothing is mutated concurrently.
//! Dropping the run future abandons in-flight fetches; records
//! accumulated to that point remain valid partial output.
//!
//! Failure policy: per-profile failures become [`SkippedProfile`]
//! outcomes after bounded retries. The run itself fails only when seed
//! discovery fails or when zero profiles were successfully processed.

use crate::config::Settings;
use crate::discover::discover;
use crate::error::RunError;
use crate::fetch::{Fetch, RetryFetch};
use crate::models::{
    AgentRecord, DiffClass, DiffResult, DiscoveredUrl, RunReport, SkippedProfile,
};
use crate::normalize::{content_hash, normalize};
use crate::profile::{parse_profile, parse_profile_details};
use crate::tracker;
use crate::utils::{timestamp_suffix, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

/// Seeds may be given relative to the configured base URL, the way the
/// site's own listing links are written.
fn resolve_seed(base_url: &str, seed: &str) -> String {
    if Url::parse(seed).is_ok() {
        return seed.to_string();
    }
    Url::parse(base_url)
        .and_then(|base| base.join(seed))
        .map(|resolved| resolved.to_string())
        .unwrap_or_else(|_| seed.to_string())
}

/// Everything one run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub records: Vec<AgentRecord>,
    pub skipped: Vec<SkippedProfile>,
    /// Present when the run was made with `monitoring_mode`.
    pub diff: Option<DiffResult>,
    pub report: RunReport,
}

/// Execute one full scrape run over the given seeds.
#[instrument(level = "info", skip_all, fields(seeds = seeds.len()))]
pub async fn run<F: Fetch>(
    fetcher: &F,
    seeds: &[String],
    settings: &Settings,
) -> Result<RunOutput, RunError> {
    let run_id = timestamp_suffix();
    let retry = RetryFetch::new(fetcher, settings.max_retries, Duration::from_secs(1));

    let mut report = RunReport {
        run_id: run_id.clone(),
        ..RunReport::default()
    };

    // ---- Discovery, drained eagerly across all seeds ----
    let mut urls: Vec<DiscoveredUrl> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for seed in seeds {
        let seed = resolve_seed(&settings.base_url, seed);
        let outcome = discover(&retry, &seed, settings.max_pages).await?;
        report.pages_walked += outcome.pages_walked;
        report.malformed_pages += outcome.malformed_pages;
        for discovered in outcome.urls {
            if seen.insert(discovered.url.clone()) {
                urls.push(discovered);
            }
        }
    }
    report.discovered = urls.len();
    info!(discovered = urls.len(), "Discovery finished");

    if let Some(limit) = settings.limit {
        if urls.len() > limit {
            info!(limit, discovered = urls.len(), "Applying profile limit");
            urls.truncate(limit);
        }
    }

    // ---- Worker pool: fetch + parse + normalize ----
    let full_details = settings.full_agent_details;
    let outcomes: Vec<Result<(AgentRecord, String), SkippedProfile>> = stream::iter(urls)
        .map(|discovered| {
            let retry = &retry;
            async move { process_profile(retry, discovered, full_details).await }
        })
        .buffer_unordered(settings.concurrency.max(1))
        .collect()
        .await;

    let mut records: Vec<(AgentRecord, String)> = Vec::new();
    let mut skipped: Vec<SkippedProfile> = Vec::new();
    let mut identities: HashSet<String> = HashSet::new();
    for outcome in outcomes {
        match outcome {
            Ok((record, hash)) => {
                // Identity is unique within one run's record set; two
                // URL spellings of the same agent collapse here.
                if identities.insert(record.identity.clone()) {
                    records.push((record, hash));
                } else {
                    debug!(identity = %record.identity, url = %record.web_url, "Duplicate identity; keeping first record");
                }
            }
            Err(skip) => {
                warn!(url = %skip.url, reason = %skip.reason, "Profile skipped");
                skipped.push(skip);
            }
        }
    }

    report.processed = records.len();
    report.skipped = skipped.len();
    info!(
        processed = report.processed,
        skipped = report.skipped,
        "Profile processing complete"
    );

    if records.is_empty() {
        return Err(RunError::NoProfiles {
            skipped: skipped.len(),
        });
    }

    // ---- Incremental diff, once, over the complete set ----
    let diff = if settings.monitoring_mode {
        let prior = tracker::load_or_empty(&settings.snapshot_path).await;
        let (diff_result, next_snapshot) =
            tracker::diff(&records, &prior, &run_id, settings.grace_runs);
        if let Err(e) = tracker::store_snapshot(&settings.snapshot_path, &next_snapshot).await {
            error!(path = %settings.snapshot_path, error = %e, "Failed to persist snapshot");
        }
        report.new = diff_result.count_of(DiffClass::New);
        report.updated = diff_result.count_of(DiffClass::Updated);
        report.unchanged = diff_result.count_of(DiffClass::Unchanged);
        report.missing = diff_result.missing.len();
        Some(diff_result)
    } else {
        None
    };

    Ok(RunOutput {
        records: records.into_iter().map(|(record, _)| record).collect(),
        skipped,
        diff,
        report,
    })
}

/// One profile's whole journey: fetch, parse, optional details fetch,
/// normalize, hash. Single-owner from start to finish.
async fn process_profile<F: Fetch>(
    fetcher: &F,
    discovered: DiscoveredUrl,
    full_details: bool,
) -> Result<(AgentRecord, String), SkippedProfile> {
    let DiscoveredUrl { url, source, depth } = discovered;
    debug!(%url, %source, depth, "Processing profile");

    let html = fetcher.fetch(&url).await.map_err(|e| SkippedProfile {
        url: url.clone(),
        reason: e.to_string(),
    })?;

    let mut raw = parse_profile(&url, &html).map_err(|e| {
        debug!(
            %url,
            preview = %truncate_for_log(&html, 200),
            "Unrecognized profile page"
        );
        SkippedProfile {
            url: url.clone(),
            reason: e.to_string(),
        }
    })?;

    if full_details {
        let details_url = format!("{}/details", url.trim_end_matches('/'));
        match fetcher.fetch(&details_url).await {
            Ok(details_html) => parse_profile_details(&details_html, &mut raw),
            // Inline sections from the main page stand.
            Err(e) => warn!(url = %details_url, error = %e, "Details fetch failed; using inline data"),
        }
    }

    let record = normalize(raw);
    let hash = content_hash(&record);
    debug!(%url, identity = %record.identity, "Profile processed");
    Ok((record, hash))
}
