//! Severity Gate
//!
//! Maps severity labels to numeric score floors and decides whether a
//! scored record clears a configured threshold.

use serde::{Deserialize, Serialize};

// ============================================================================
// SEVERITY LABELS
// ============================================================================

/// Minimum-severity label for alert filtering.
///
/// `All` is the default and lets everything through, including records
/// without a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    All,
}

impl Severity {
    /// Numeric floor a CVSS score must meet or exceed.
    pub fn floor_score(&self) -> f64 {
        match self {
            Severity::Critical => 9.0,
            Severity::High => 7.0,
            Severity::Medium => 4.0,
            Severity::Low => 0.1,
            Severity::All => 0.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::All => "all",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "critical" => Ok(Severity::Critical),
            "high" => Ok(Severity::High),
            "medium" => Ok(Severity::Medium),
            "low" => Ok(Severity::Low),
            "all" => Ok(Severity::All),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown severity label: {0}")]
pub struct UnknownSeverity(pub String);

// ============================================================================
// GATE
// ============================================================================

/// Decide whether a record with the given score clears `floor`.
///
/// A missing score only passes when the floor is `All`: an unscored
/// record is never surfaced under a non-trivial threshold.
pub fn passes(score: Option<f64>, floor: Severity) -> bool {
    if floor == Severity::All {
        return true;
    }
    match score {
        Some(s) => s >= floor.floor_score(),
        None => false,
    }
}

/// Label a score for display purposes (inverse of the floor table).
pub fn label_for_score(score: Option<f64>) -> &'static str {
    match score {
        None => "unknown",
        Some(s) if s >= 9.0 => "critical",
        Some(s) if s >= 7.0 => "high",
        Some(s) if s >= 4.0 => "medium",
        Some(s) if s >= 0.1 => "low",
        Some(_) => "none",
    }
}

// ============================================================================
// TESTS
// ============================================================================
