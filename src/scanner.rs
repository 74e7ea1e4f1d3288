//! Identifier Scanner
//!
//! Extracts vulnerability identifiers (CVE-YYYY-NNNN+) from free text,
//! normalizes and deduplicates them. A stricter anchored pattern is used
//! as a second check before any identifier is allowed to trigger a fetch.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// PATTERNS
// ============================================================================

/// Finds candidate identifiers anywhere in message text.
static SCAN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)CVE-\d{4}-\d{4,}").unwrap());

/// Anchored validation pattern applied before fetching.
static VALIDATE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^CVE-\d{4}-\d{4,}$").unwrap());

// ============================================================================
// SCAN RESULT
// ============================================================================

/// Result of scanning one piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHit {
    /// Distinct identifiers, upper-cased, in first-occurrence order.
    pub ids: Vec<String>,
    /// Distinct count before any caller-side capping.
    pub distinct_found: usize,
}

impl ScanHit {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Scan text for identifiers, upper-casing and deduplicating matches.
pub fn scan(text: &str) -> ScanHit {
    let mut ids: Vec<String> = Vec::new();
    for m in SCAN_REGEX.find_iter(text) {
        let id = m.as_str().to_ascii_uppercase();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    let distinct_found = ids.len();
    ScanHit { ids, distinct_found }
}

/// Strict format check for a single candidate identifier.
pub fn is_valid_id(candidate: &str) -> bool {
    VALIDATE_REGEX.is_match(candidate)
}

// ============================================================================
// TESTS
// ============================================================================
