//! Notification Payloads
//!
//! Structured alert payloads handed to the external renderer. This module
//! selects which fields are populated under verbose vs standard mode; how
//! they are turned into platform-specific rich content is not our concern.

use serde::Serialize;

use crate::intel::{ExploitationRecord, VulnerabilityRecord};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Character limit for the standard-mode description snippet
const STANDARD_DESCRIPTION_LIMIT: usize = 100;

/// Reference links included in a verbose alert
const MAX_REFERENCE_LINKS: usize = 5;

// ============================================================================
// PAYLOADS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceLine {
    pub url: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
}

/// Alert for a vulnerability record. Standard mode carries only the
/// identifier, a description snippet and the score; verbose mode carries
/// the full detail set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerabilityAlert {
    pub title: String,
    pub description: String,
    pub score: Option<f64>,
    /// Populated in verbose mode only
    pub score_version: Option<String>,
    /// Populated in verbose mode only
    pub vector: Option<String>,
    /// Populated in verbose mode only
    pub weaknesses: Vec<String>,
    /// Populated in verbose mode only
    pub published: Option<String>,
    /// Populated in verbose mode only
    pub modified: Option<String>,
    pub link: String,
    pub source: &'static str,
    /// Populated in verbose mode only, capped at `MAX_REFERENCE_LINKS`
    pub references: Vec<ReferenceLine>,
    /// References beyond the cap, for a "...and N more" line
    pub extra_references: usize,
    pub verbose: bool,
}

/// Alert flagging an identifier as known-exploited.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExploitationAlert {
    pub title: String,
    pub name: String,
    pub due_date: Option<String>,
    /// Populated in verbose mode only
    pub vendor: Option<String>,
    /// Populated in verbose mode only
    pub product: Option<String>,
    /// Populated in verbose mode only
    pub required_action: Option<String>,
    /// Populated in verbose mode only
    pub ransomware_use: Option<String>,
    pub link: String,
    pub verbose: bool,
}

/// One emission toward the notification sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Notification {
    Vulnerability(VulnerabilityAlert),
    Exploitation(ExploitationAlert),
}

impl Notification {
    /// Build a vulnerability alert with the field set for the given mode.
    pub fn vulnerability(record: &VulnerabilityRecord, verbose: bool) -> Self {
        let description = if verbose {
            record.description.clone()
        } else {
            snippet(&record.description, STANDARD_DESCRIPTION_LIMIT)
        };

        let (references, extra_references) = if verbose {
            let shown: Vec<ReferenceLine> = record
                .references
                .iter()
                .take(MAX_REFERENCE_LINKS)
                .map(|r| ReferenceLine {
                    url: r.url.clone(),
                    source: r.source.clone(),
                    tags: r.tags.clone(),
                })
                .collect();
            let extra = record.references.len().saturating_sub(shown.len());
            (shown, extra)
        } else {
            (Vec::new(), 0)
        };

        Notification::Vulnerability(VulnerabilityAlert {
            title: record.id.clone(),
            description,
            score: record.score,
            score_version: if verbose {
                record.score_version.clone()
            } else {
                None
            },
            vector: if verbose { record.vector.clone() } else { None },
            weaknesses: if verbose {
                record.weaknesses.clone()
            } else {
                Vec::new()
            },
            published: if verbose {
                record.published.map(|t| t.to_rfc3339())
            } else {
                None
            },
            modified: if verbose {
                record.modified.map(|t| t.to_rfc3339())
            } else {
                None
            },
            link: record.link.clone(),
            source: record.source,
            references,
            extra_references,
            verbose,
        })
    }

    /// Build an exploitation alert with the field set for the given mode.
    pub fn exploitation(record: &ExploitationRecord, link: String, verbose: bool) -> Self {
        Notification::Exploitation(ExploitationAlert {
            title: format!("KEV Alert: {} is known exploited", record.id),
            name: record.name.clone(),
            due_date: record.due_date.clone(),
            vendor: verbose.then(|| record.vendor.clone()),
            product: verbose.then(|| record.product.clone()),
            required_action: verbose.then(|| record.required_action.clone()),
            ransomware_use: verbose.then(|| record.ransomware_use.clone()),
            link,
            verbose,
        })
    }

    pub fn is_exploitation_alert(&self) -> bool {
        matches!(self, Notification::Exploitation(_))
    }

    pub fn verbose(&self) -> bool {
        match self {
            Notification::Vulnerability(a) => a.verbose,
            Notification::Exploitation(a) => a.verbose,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Notification::Vulnerability(a) => &a.title,
            Notification::Exploitation(a) => &a.title,
        }
    }
}

fn snippet(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let cut: String = text.chars().take(limit).collect();
    format!("{}...", cut)
}

// ============================================================================
// SINK
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("notification sink failure: {0}")]
pub struct SinkError(pub String);

/// Destination for emissions. Implemented by the chat-platform adapter
/// outside this crate; tests use an in-memory recorder.
pub trait NotificationSink: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<(), SinkError>;

    /// Informational text message (e.g. the truncation notice). The sink
    /// may expire it after `expire_after_secs`.
    fn send_notice(&self, text: &str, expire_after_secs: Option<u64>) -> Result<(), SinkError>;
}

// ============================================================================
// TESTS
// ============================================================================
