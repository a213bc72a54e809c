//! Data models for agent records and the incremental-run bookkeeping.
//!
//! This module defines the core data structures used throughout the application:
//! - [`RawAgentFields`]: Field-by-field parser output for one profile page
//! - [`AgentRecord`]: The normalized, export-ready agent schema
//! - [`DiscoveredUrl`]: A profile or listing URL found during discovery
//! - [`Snapshot`] / [`SnapshotEntry`]: Persisted prior-run state
//! - [`DiffResult`]: Per-run classification of each agent against the snapshot
//! - [`RunReport`]: Whole-run counters returned by the pipeline
//!
//! Absence of an optional field is always `None`, never a zero sentinel:
//! `review_count: Some(0)` means the page said "0 reviews", while `None`
//! means the page did not say.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A phone number attached to an agent or office.
///
/// The `number` is canonicalized by the normalizer to digits plus an
/// optional leading `+`. `extension` is absent for most entries.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Phone {
    /// The phone number, canonicalized to digits and a leading `+`.
    pub number: String,
    /// "Mobile", "Office", or "Fax" when the page labels the number.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub phone_type: Option<String>,
    /// Extension digits, when the page lists one (e.g. "ext. 204").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

/// A single customer review on an agent profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Review {
    /// Star rating, when it could be read as a number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Review body. The normalizer truncates very long comments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Date text as printed on the page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// A postal address with a consistent field set.
///
/// Components the source page omitted stay `None`. When the page only
/// exposes one unstructured blob, it lands in `line`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
}

/// The office/brokerage an agent works out of.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Office {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// The office's own address, parsed with the same partial-success
    /// policy as the agent's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// The broker of record, when the profile names one.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Broker {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

/// Aggregate stats over an agent's active listings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PriceSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Aggregate stats over an agent's recently sold listings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SoldSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

/// Parser output for one profile page, before normalization.
///
/// Every field is extracted independently; a missing or malformed field
/// stays at its default and the parse proceeds. Numbers are already
/// coerced here (non-numeric text becomes `None`, not zero); string
/// cleanup, phone canonicalization, dedup, and identity derivation are
/// the normalizer's job.
#[derive(Debug, Clone, Default)]
pub struct RawAgentFields {
    pub advertiser_id: Option<String>,
    pub web_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub photo: Option<String>,
    pub experience: Option<String>,
    pub first_year: Option<i32>,
    pub agent_rating: Option<f64>,
    pub review_count: Option<u32>,
    /// Phone entries with raw number text; type/extension already split.
    pub phones: Vec<Phone>,
    /// Unstructured address text as printed on the page.
    pub address: Option<String>,
    pub office_name: Option<String>,
    pub office_website: Option<String>,
    /// Unstructured office address text.
    pub office_address: Option<String>,
    pub broker: Option<Broker>,
    pub specializations: Vec<String>,
    pub reviews: Vec<Review>,
    pub recommendations: Vec<String>,
    pub for_sale: Option<PriceSummary>,
    pub recently_sold: Option<SoldSummary>,
}

/// A fully normalized agent record, the shape handed to export sinks.
///
/// `identity` is stable across runs: the advertiser id when the page
/// exposes one, otherwise a hash derived from the canonical profile URL.
/// It is unique across the record set produced by one run.
///
/// Ordered collections (`phones`, `reviews`, `recommendations`,
/// `specializations`) preserve the order the page presented them in.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AgentRecord {
    /// Stable per-agent key used to correlate records across runs.
    pub identity: String,
    /// The site's own advertiser identifier, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advertiser_id: Option<String>,
    /// Canonical profile URL.
    pub web_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
    /// First year in business.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phones: Vec<Phone>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub specializations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviews: Vec<Review>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub office: Option<Office>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broker: Option<Broker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub for_sale: Option<PriceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recently_sold: Option<SoldSummary>,
}

/// A URL found during discovery, waiting to be fetched.
///
/// Created by the discoverer, consumed once by the fetch stage.
/// Deduplicated by canonical URL before it ever reaches fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUrl {
    /// Canonical URL of the agent profile.
    pub url: String,
    /// The page this URL was found on.
    pub source: String,
    /// Pagination depth: 0 for a direct seed, page index otherwise.
    pub depth: u32,
}

/// Persisted state for one identity from a prior run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SnapshotEntry {
    pub identity: String,
    /// Content-hash of the record the last time it was seen.
    pub content_hash: String,
    pub last_seen_run_id: String,
    /// Consecutive runs this identity has been absent. Reset to zero on
    /// every sighting; entries past the grace window are evicted.
    #[serde(default)]
    pub missing_runs: u32,
}

/// The persisted identity -> [`SnapshotEntry`] mapping.
///
/// A `BTreeMap` keeps the serialized form stable across runs, which keeps
/// snapshot files diffable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Snapshot {
    pub entries: BTreeMap<String, SnapshotEntry>,
}

/// Classification of one current-run record against the prior snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffClass {
    New,
    Updated,
    Unchanged,
}

/// Per-run diff of the current record set against the prior snapshot.
///
/// `missing` lists identities that were in the prior snapshot but not in
/// this run. That is a signal (agent no longer found), not an error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DiffResult {
    /// Classification for every identity in the current run.
    pub classes: BTreeMap<String, DiffClass>,
    /// Identities seen in a prior run but absent from this one.
    pub missing: Vec<String>,
}

impl DiffResult {
    pub fn count_of(&self, class: DiffClass) -> usize {
        self.classes.values().filter(|c| **c == class).count()
    }
}

/// A profile that was discovered but could not be turned into a record.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SkippedProfile {
    pub url: String,
    pub reason: String,
}

/// Whole-run counters, threaded through the pipeline and returned with
/// the record set so partial success is always distinguishable from
/// silent data loss.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Profile URLs found by discovery (after dedup, before any limit).
    pub discovered: usize,
    /// Listing pages walked during discovery.
    pub pages_walked: u32,
    /// Listing pages that could not be parsed and were skipped.
    pub malformed_pages: u32,
    /// Profiles that produced a normalized record.
    pub processed: usize,
    /// Profiles that failed fetch or parse after retries.
    pub skipped: usize,
    pub new: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub missing: usize,
}
