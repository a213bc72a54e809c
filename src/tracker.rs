//! Incremental change detection against the prior-run snapshot.
//!
//! The tracker compares one completed run's record set against the
//! persisted snapshot and classifies every agent as new, updated, or
//! unchanged. Agents that were in the snapshot but not in the run are
//! reported missing and retained for a grace window of runs, so one bad
//! run never false-declares an agent removed.
//!
//! Per-identity lifecycle across runs:
//!
//! ```text
//! unseen -> new -> (unchanged | updated)* -> (missing)* -> evicted
//! ```
//!
//! The snapshot file is read once at run start and rewritten atomically
//! (temp file + rename) at run end; a half-written snapshot is never
//! observable. An unreadable or corrupt snapshot degrades to an empty
//! one — the run proceeds and everything classifies `new`.

use crate::error::SnapshotError;
use crate::models::{AgentRecord, DiffClass, DiffResult, Snapshot, SnapshotEntry};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Classify the current run's records against the prior snapshot and
/// build the snapshot for the next run.
///
/// Must be called exactly once per run, over the complete accumulated
/// record set — diffing a partial set would misreport every
/// not-yet-processed agent as missing.
pub fn diff(
    current: &[(AgentRecord, String)],
    prior: &Snapshot,
    run_id: &str,
    grace_runs: u32,
) -> (DiffResult, Snapshot) {
    let mut result = DiffResult::default();
    let mut next = Snapshot::default();

    for (record, hash) in current {
        let class = match prior.entries.get(&record.identity) {
            None => DiffClass::New,
            Some(entry) if entry.content_hash != *hash => DiffClass::Updated,
            Some(_) => DiffClass::Unchanged,
        };
        result.classes.insert(record.identity.clone(), class);
        next.entries.insert(
            record.identity.clone(),
            SnapshotEntry {
                identity: record.identity.clone(),
                content_hash: hash.clone(),
                last_seen_run_id: run_id.to_string(),
                missing_runs: 0,
            },
        );
    }

    for (identity, entry) in &prior.entries {
        if result.classes.contains_key(identity) {
            continue;
        }
        let missing_runs = entry.missing_runs + 1;
        if missing_runs <= grace_runs {
            result.missing.push(identity.clone());
            next.entries.insert(
                identity.clone(),
                SnapshotEntry {
                    missing_runs,
                    ..entry.clone()
                },
            );
        } else {
            info!(
                identity = %identity,
                last_seen_run_id = %entry.last_seen_run_id,
                missing_runs,
                "Evicting agent from snapshot after grace period"
            );
        }
    }

    debug!(
        new = result.count_of(DiffClass::New),
        updated = result.count_of(DiffClass::Updated),
        unchanged = result.count_of(DiffClass::Unchanged),
        missing = result.missing.len(),
        "Computed run diff"
    );
    (result, next)
}

/// Read the prior snapshot. A missing file is a normal first run and
/// yields an empty snapshot; io and decode failures are errors for the
/// caller to degrade on.
#[instrument(level = "debug", skip_all, fields(%path))]
pub async fn load_snapshot(path: &str) -> Result<Snapshot, SnapshotError> {
    match fs::read_to_string(path).await {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|e| SnapshotError::Corrupt {
                path: path.to_string(),
                source: e,
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Snapshot::default()),
        Err(e) => Err(SnapshotError::Io {
            path: path.to_string(),
            source: e,
        }),
    }
}

/// [`load_snapshot`] with the degrade policy applied: any failure is
/// logged and the run continues as if no prior snapshot existed.
pub async fn load_or_empty(path: &str) -> Snapshot {
    match load_snapshot(path).await {
        Ok(snapshot) => {
            debug!(%path, entries = snapshot.entries.len(), "Loaded prior snapshot");
            snapshot
        }
        Err(e) => {
            warn!(%path, error = %e, "Prior snapshot unusable; treating run as first");
            Snapshot::default()
        }
    }
}

/// Persist the snapshot for the next run.
///
/// Writes to a sibling temp file and renames over the target so the old
/// snapshot stays intact until the new one is fully on disk.
#[instrument(level = "debug", skip_all, fields(%path))]
pub async fn store_snapshot(path: &str, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_string(),
        source,
    };

    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }
    }

    let json = serde_json::to_string_pretty(snapshot).map_err(|e| SnapshotError::Corrupt {
        path: path.to_string(),
        source: e,
    })?;

    let tmp_path = format!("{path}.tmp");
    fs::write(&tmp_path, json).await.map_err(io_err)?;
    fs::rename(&tmp_path, path).await.map_err(io_err)?;
    info!(%path, entries = snapshot.entries.len(), "Wrote snapshot");
    Ok(())
}
