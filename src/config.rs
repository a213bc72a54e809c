//! Runtime settings: YAML file plus per-flag CLI overrides.
//!
//! Defaults are chosen so the scraper runs with nothing but a seed URL;
//! a settings file tunes the rest. CLI flags win over the file, the file
//! wins over defaults.

use crate::cli::Cli;
use serde::{Deserialize, Serialize};
use std::error::Error;
use tracing::{debug, info};

fn default_base_url() -> String {
    "https://www.realtor.com".to_string()
}
fn default_output_dir() -> String {
    "output".to_string()
}
fn default_snapshot_path() -> String {
    "output/snapshot.json".to_string()
}
fn default_export_formats() -> Vec<String> {
    vec!["json".to_string(), "csv".to_string()]
}
fn default_concurrency() -> usize {
    8
}
fn default_max_pages() -> u32 {
    20
}
fn default_max_retries() -> usize {
    3
}
fn default_grace_runs() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    15
}

/// Everything a run needs beyond its seed URLs.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Base used to resolve relative links on listing pages.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Fetch the per-agent details sub-page (reviews, recommendations,
    /// specializations) at the cost of one extra fetch per agent.
    #[serde(default)]
    pub full_agent_details: bool,
    /// Diff this run against the persisted snapshot.
    #[serde(default)]
    pub monitoring_mode: bool,
    /// Pagination cap per listing seed.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Worker pool size for concurrent profile processing.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_export_formats")]
    pub export_formats: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
    /// Retry budget per fetch for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Runs a missing agent is retained in the snapshot before eviction.
    #[serde(default = "default_grace_runs")]
    pub grace_runs: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cap on profiles processed per run, for quick tests.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        // serde's field defaults are the single source of truth.
        serde_yaml::from_str("{}").expect("empty settings must deserialize")
    }
}

impl Settings {
    /// Load settings from a YAML file, or start from defaults when no
    /// file was given.
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        let settings = match path {
            Some(path) => {
                debug!(%path, "Loading settings file");
                let contents = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&contents)?
            }
            None => Settings::default(),
        };
        Ok(settings)
    }

    /// Apply CLI flag overrides on top of file/default values.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(ref output_dir) = cli.output_dir {
            self.output_dir = output_dir.clone();
        }
        if let Some(ref formats) = cli.formats {
            self.export_formats = formats
                .split(',')
                .map(|f| f.trim().to_ascii_lowercase())
                .filter(|f| !f.is_empty())
                .collect();
        }
        if let Some(max_pages) = cli.max_pages {
            self.max_pages = max_pages;
        }
        if let Some(concurrency) = cli.concurrency {
            self.concurrency = concurrency.max(1);
        }
        if let Some(limit) = cli.limit {
            self.limit = Some(limit);
        }
        if let Some(ref snapshot) = cli.snapshot {
            self.snapshot_path = snapshot.clone();
        }
        if cli.monitoring {
            self.monitoring_mode = true;
        }
        if cli.full_details {
            self.full_agent_details = true;
        }
        info!(
            concurrency = self.concurrency,
            max_pages = self.max_pages,
            monitoring_mode = self.monitoring_mode,
            full_agent_details = self.full_agent_details,
            formats = ?self.export_formats,
            "Resolved settings"
        );
        self
    }
}
