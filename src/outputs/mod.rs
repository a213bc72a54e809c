//! Export sinks for the normalized record set and the run diff.
//!
//! Each submodule writes one encoding of the same data:
//!
//! - [`json`]: the full record set, and the diff report when monitoring
//! - [`csv`]: one row per agent, nested values flattened to JSON strings
//! - [`xml`]: `<agents><agent>...</agent></agents>` with the same flattening
//!
//! Files are named `agents_<UTC timestamp>.<ext>` (and
//! `diff_<UTC timestamp>.json`) so successive runs never clobber each
//! other. A failing sink is logged and the remaining formats still run;
//! only zero successful exports is an error.

pub mod csv;
pub mod json;
pub mod xml;

use crate::models::{AgentRecord, DiffResult};
use crate::utils::timestamp_suffix;
use std::error::Error;
use tracing::{error, info, warn};

/// Write every requested format, plus the diff report when one exists.
///
/// Returns the paths written. Fails only when no format succeeded.
pub async fn export_all(
    records: &[AgentRecord],
    diff: Option<&DiffResult>,
    output_dir: &str,
    formats: &[String],
) -> Result<Vec<String>, Box<dyn Error>> {
    let stamp = timestamp_suffix();
    let mut written = Vec::new();

    for format in formats {
        let result = match format.as_str() {
            "json" => json::write_agents(records, output_dir, &stamp).await,
            "csv" => csv::write_agents(records, output_dir, &stamp).await,
            "xml" => xml::write_agents(records, output_dir, &stamp).await,
            other => {
                warn!(format = %other, "Unknown export format; skipping");
                continue;
            }
        };
        match result {
            Ok(path) => {
                info!(format = %format, path = %path, "Export written");
                written.push(path);
            }
            Err(e) => error!(format = %format, error = %e, "Export failed"),
        }
    }

    if let Some(diff) = diff {
        match json::write_diff(diff, output_dir, &stamp).await {
            Ok(path) => {
                info!(path = %path, "Diff report written");
                written.push(path);
            }
            Err(e) => error!(error = %e, "Diff report export failed"),
        }
    }

    if written.is_empty() {
        return Err("no exports were successfully generated".into());
    }
    Ok(written)
}
