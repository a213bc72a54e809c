//! JSON export of the record set and the per-run diff report.

use crate::models::{AgentRecord, DiffResult};
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Write the full record set to `{output_dir}/agents_{stamp}.json`.
#[instrument(level = "info", skip_all, fields(%output_dir))]
pub async fn write_agents(
    records: &[AgentRecord],
    output_dir: &str,
    stamp: &str,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;
    fs::create_dir_all(output_dir).await?;
    let path = format!("{}/agents_{stamp}.json", output_dir.trim_end_matches('/'));
    fs::write(&path, json).await?;
    info!(path = %path, count = records.len(), "Wrote agents JSON");
    Ok(path)
}

/// Write the diff report to `{output_dir}/diff_{stamp}.json`.
#[instrument(level = "info", skip_all, fields(%output_dir))]
pub async fn write_diff(
    diff: &DiffResult,
    output_dir: &str,
    stamp: &str,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(diff)?;
    fs::create_dir_all(output_dir).await?;
    let path = format!("{}/diff_{stamp}.json", output_dir.trim_end_matches('/'));
    fs::write(&path, json).await?;
    info!(path = %path, "Wrote diff report");
    Ok(path)
}
