//! Error taxonomy for the scraping pipeline.
//!
//! Per-profile failures ([`FetchError`], [`ParseError`]) are contained by
//! the orchestrator as skipped profiles; only [`RunError`] surfaces out of
//! a run. [`SnapshotError`] never fails a run either: an unreadable prior
//! snapshot degrades to an empty one.

use thiserror::Error;

/// Failure fetching one URL. Transient failures are retried with backoff;
/// permanent failures are not.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Retryable: network trouble, timeouts, 429s, and 5xx responses.
    #[error("transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },
    /// Not retryable: the resource is gone or the request is rejected.
    #[error("permanent fetch failure for {url}: {reason}")]
    Permanent { url: String, reason: String },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Failure walking a listing page for agent links and pagination.
///
/// "No next link" is not an error; it is normal termination. This error
/// means the page has no recognizable listing structure at all.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("page has no recognizable listing structure: {url}")]
    UnrecognizedListing { url: String },
    #[error("failed to fetch seed page {url}: {source}")]
    SeedFetch {
        url: String,
        #[source]
        source: FetchError,
    },
}

/// Failure parsing one profile page.
///
/// Individual missing fields are not errors; this fires only when the
/// page is not a recognizable profile page at all (an error page, a
/// redirect target, a captcha wall).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not a recognizable agent profile page: {url}")]
    UnrecognizedPage { url: String },
}

/// Failure reading or writing the persisted snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Run-level failure. Per-profile failures never produce one of these;
/// a run fails only when discovery itself fails or nothing at all was
/// successfully processed.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    #[error("no profiles were successfully processed ({skipped} skipped)")]
    NoProfiles { skipped: usize },
}
