//! Recent Vulnerability Query Engine
//!
//! Answers "what was published in the last N days" with optional filters.
//! Fetches the full candidate window once, filters in sequence, sorts by
//! publication time descending and truncates to the requested limit.

use chrono::{DateTime, Utc};

use crate::intel::{EnrichmentClient, IntelError, VulnerabilityRecord};
use crate::severity::{self, Severity};

// ============================================================================
// PARAMETERS & OUTCOMES
// ============================================================================

#[derive(Debug, Clone)]
pub struct QueryParams {
    pub window_days: u32,
    pub limit: usize,
    pub severity: Option<Severity>,
    /// Case-insensitive substring match against description text. An
    /// approximation, not structured vendor matching.
    pub vendor: Option<String>,
    /// Same approximation as `vendor`.
    pub product: Option<String>,
    /// `Some(true)` keeps only known-exploited records, `Some(false)`
    /// keeps only the rest.
    pub exploited: Option<bool>,
}

impl QueryParams {
    pub fn new(window_days: u32, limit: usize) -> Self {
        Self {
            window_days,
            limit,
            severity: None,
            vendor: None,
            product: None,
            exploited: None,
        }
    }
}

/// Distinguishes "the window had no data" from "filters matched nothing":
/// both come back as variants, never as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// The fetch itself returned nothing for the window
    Empty,
    Matches {
        /// Post-filter records, sorted and truncated to the limit
        records: Vec<VulnerabilityRecord>,
        /// Pre-truncation filtered count
        total_matched: usize,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("could not fetch the recent window: {0}")]
    Fetch(#[from] IntelError),
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Run one query. A fetch failure is a hard failure; an empty window is a
/// distinct non-error outcome.
pub fn run<C: EnrichmentClient>(
    client: &C,
    params: &QueryParams,
) -> Result<QueryOutcome, QueryError> {
    let candidates = client.fetch_recent(params.window_days)?;
    if candidates.is_empty() {
        return Ok(QueryOutcome::Empty);
    }

    let mut matched: Vec<VulnerabilityRecord> = candidates
        .into_iter()
        .filter(|r| passes_severity(r, params.severity))
        .filter(|r| passes_substring(r, params.vendor.as_deref()))
        .filter(|r| passes_substring(r, params.product.as_deref()))
        .collect();

    if let Some(want_exploited) = params.exploited {
        // Membership set from the exploitation catalog, exact-id equality
        let catalog = client.fetch_full_exploitation_catalog();
        let exploited_ids: std::collections::HashSet<String> =
            catalog.into_iter().map(|r| r.id).collect();
        matched.retain(|r| exploited_ids.contains(&r.id) == want_exploited);
    }

    let total_matched = matched.len();

    // Missing timestamps sort as the oldest possible value
    matched.sort_by_key(|r| std::cmp::Reverse(r.published.unwrap_or(epoch())));
    matched.truncate(params.limit);

    log::debug!(
        "Query over {} days matched {} records ({} returned)",
        params.window_days,
        total_matched,
        matched.len()
    );

    Ok(QueryOutcome::Matches {
        records: matched,
        total_matched,
    })
}

// ============================================================================
// FILTERS
// ============================================================================

/// Records without a score are dropped under any non-`all` floor.
fn passes_severity(record: &VulnerabilityRecord, floor: Option<Severity>) -> bool {
    match floor {
        Some(floor) => severity::passes(record.score, floor),
        None => true,
    }
}

fn passes_substring(record: &VulnerabilityRecord, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) => record
            .description
            .to_lowercase()
            .contains(&needle.to_lowercase()),
        None => true,
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

// ============================================================================
// TESTS
// ============================================================================
