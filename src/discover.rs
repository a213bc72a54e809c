//! Agent-profile URL discovery across paginated listing pages.
//!
//! A seed is either a direct agent profile URL (yielded as-is, no walk)
//! or a listing/search page. Listing pages are walked through their
//! "next" relation until the chain ends or `max_pages` is reached;
//! running out of pages is normal termination, not an error.
//!
//! URLs are canonicalized before dedup so the same profile reached with
//! different tracking parameters is only fetched once.

use crate::error::DiscoveryError;
use crate::fetch::Fetch;
use crate::models::DiscoveredUrl;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

static AGENT_LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href*='realestateagents'], a[href*='/agents/']").unwrap());

static NEXT_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a[rel='next'], .pagination a.next, a[aria-label='Next']").unwrap()
});

static RESULTS_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("[data-testid='search-results'], .search-results, .agent-list").unwrap()
});

/// Query parameters that vary per visit without changing the page.
const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_", "mc_"];
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "cid"];

/// Everything discovery produced for one seed.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    pub urls: Vec<DiscoveredUrl>,
    pub pages_walked: u32,
    /// Listing pages in the chain that could not be fetched or parsed.
    pub malformed_pages: u32,
}

/// Canonical form of a URL used for dedup and identity derivation.
///
/// Lowercases the host, drops the fragment and tracking query
/// parameters, and strips the trailing slash from non-root paths.
/// Returns `None` for anything that does not parse as an absolute URL.
pub fn canonical_url(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.host_str()?;

    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| {
            let k = k.to_ascii_lowercase();
            !TRACKING_PARAMS.contains(&k.as_str())
                && !TRACKING_PARAM_PREFIXES.iter().any(|p| k.starts_with(p))
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    if let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) {
        let _ = url.set_host(Some(&host));
    }

    let mut out = url.to_string();
    if url.path() != "/" && url.query().is_none() {
        while out.ends_with('/') {
            out.pop();
        }
    }
    Some(out)
}

/// Whether a URL points at an individual agent profile rather than a
/// listing page.
pub fn looks_like_agent_profile(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_else(|_| url.to_ascii_lowercase());
    path.contains("realestateagents") || path.contains("/agents/")
}

/// Extract agent links and the next-page link from one listing page.
///
/// Parsing is synchronous and self-contained so the document never lives
/// across an await point.
fn parse_listing(url: &str, html: &str) -> Result<(Vec<String>, Option<String>), DiscoveryError> {
    let document = Html::parse_document(html);

    if document.select(&RESULTS_SELECTOR).next().is_none() {
        return Err(DiscoveryError::UnrecognizedListing {
            url: url.to_string(),
        });
    }

    let base = Url::parse(url).map_err(|_| DiscoveryError::UnrecognizedListing {
        url: url.to_string(),
    })?;

    let mut links = Vec::new();
    for element in document.select(&AGENT_LINK_SELECTOR) {
        if let Some(href) = element.value().attr("href") {
            if let Ok(resolved) = base.join(href) {
                if let Some(canonical) = canonical_url(resolved.as_str()) {
                    links.push(canonical);
                }
            }
        }
    }

    let next = document
        .select(&NEXT_LINK_SELECTOR)
        .next()
        .and_then(|a| a.value().attr("href"))
        .and_then(|href| base.join(href).ok())
        .and_then(|u| canonical_url(u.as_str()));

    Ok((links, next))
}

/// Walk a seed URL into a deduplicated list of agent profile URLs.
///
/// A profile-shaped seed yields exactly itself. A listing seed is walked
/// page by page; a malformed page mid-chain is recorded and ends that
/// branch, while an unrecognizable *seed* page fails the whole discovery.
#[instrument(level = "info", skip(fetcher))]
pub async fn discover<F: Fetch>(
    fetcher: &F,
    seed: &str,
    max_pages: u32,
) -> Result<DiscoveryOutcome, DiscoveryError> {
    let seed_canonical =
        canonical_url(seed).ok_or_else(|| DiscoveryError::UnrecognizedListing {
            url: seed.to_string(),
        })?;

    let mut outcome = DiscoveryOutcome::default();

    if looks_like_agent_profile(&seed_canonical) {
        debug!(url = %seed_canonical, "Seed is a direct agent profile");
        outcome.urls.push(DiscoveredUrl {
            url: seed_canonical.clone(),
            source: seed_canonical,
            depth: 0,
        });
        return Ok(outcome);
    }

    let mut seen_profiles: HashSet<String> = HashSet::new();
    let mut visited_pages: HashSet<String> = HashSet::new();
    let mut page_url = seed_canonical;
    let mut depth: u32 = 1;

    while depth <= max_pages {
        if !visited_pages.insert(page_url.clone()) {
            debug!(url = %page_url, "Pagination loop detected; stopping walk");
            break;
        }

        let html = match fetcher.fetch(&page_url).await {
            Ok(html) => html,
            Err(e) if depth == 1 => {
                return Err(DiscoveryError::SeedFetch {
                    url: page_url,
                    source: e,
                });
            }
            Err(e) => {
                warn!(url = %page_url, error = %e, "Listing page fetch failed; ending walk");
                outcome.malformed_pages += 1;
                break;
            }
        };
        outcome.pages_walked += 1;

        let (links, next) = match parse_listing(&page_url, &html) {
            Ok(parsed) => parsed,
            Err(e) if depth == 1 => return Err(e),
            Err(e) => {
                warn!(url = %page_url, error = %e, "Listing page unrecognized; ending walk");
                outcome.malformed_pages += 1;
                break;
            }
        };

        let mut found_here = 0usize;
        for link in links {
            if seen_profiles.insert(link.clone()) {
                found_here += 1;
                outcome.urls.push(DiscoveredUrl {
                    url: link,
                    source: page_url.clone(),
                    depth,
                });
            }
        }
        debug!(url = %page_url, depth, found = found_here, "Walked listing page");

        match next {
            Some(next_url) => {
                page_url = next_url;
                depth += 1;
            }
            // No next link: exhausted pagination, normal termination.
            None => break,
        }
    }

    info!(
        profiles = outcome.urls.len(),
        pages = outcome.pages_walked,
        malformed = outcome.malformed_pages,
        "Discovery complete"
    );
    Ok(outcome)
}
