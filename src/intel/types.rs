//! Enrichment Types
//!
//! Domain records returned by the two upstream sources plus the wire
//! formats they are parsed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// VULNERABILITY RECORD
// ============================================================================

/// A single reference entry attached to a vulnerability record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub url: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
}

/// Canonical vulnerability record from the primary source. Immutable once
/// fetched; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub description: String,
    /// CVSS base score, 0.0-10.0 when present
    pub score: Option<f64>,
    /// e.g. "3.1 (CRITICAL)"
    pub score_version: Option<String>,
    /// Structured attack vector string
    pub vector: Option<String>,
    /// CWE classifiers, deduplicated and sorted
    pub weaknesses: Vec<String>,
    pub published: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    /// Canonical detail page for this record
    pub link: String,
    pub references: Vec<Reference>,
    /// Data source label shown to users
    pub source: &'static str,
}

// ============================================================================
// EXPLOITATION RECORD
// ============================================================================

/// Entry from the exploited-in-the-wild catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExploitationRecord {
    pub id: String,
    pub vendor: String,
    pub product: String,
    pub name: String,
    pub date_added: Option<String>,
    pub short_description: String,
    pub required_action: String,
    pub due_date: Option<String>,
    /// "Known" / "Unknown" in the upstream feed
    pub ransomware_use: String,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IntelError {
    #[error("upstream request failed: {0}")]
    Network(String),
    #[error("upstream returned status {status}")]
    Status { status: u16 },
    #[error("could not parse upstream response: {0}")]
    Parse(String),
}

impl From<ureq::Error> for IntelError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(status, _) => IntelError::Status { status },
            other => IntelError::Network(other.to_string()),
        }
    }
}

impl From<std::io::Error> for IntelError {
    fn from(e: std::io::Error) -> Self {
        IntelError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for IntelError {
    fn from(e: serde_json::Error) -> Self {
        IntelError::Parse(e.to_string())
    }
}

// ============================================================================
// WIRE FORMATS (primary source, CVE API 2.0)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NvdApiResponse {
    #[serde(rename = "resultsPerPage")]
    pub results_per_page: Option<usize>,
    #[serde(rename = "startIndex")]
    pub start_index: Option<usize>,
    #[serde(rename = "totalResults")]
    pub total_results: Option<usize>,
    #[serde(default)]
    pub vulnerabilities: Vec<NvdVulnerabilityItem>,
}

#[derive(Debug, Deserialize)]
pub struct NvdVulnerabilityItem {
    pub cve: NvdCve,
}

#[derive(Debug, Deserialize)]
pub struct NvdCve {
    pub id: String,
    pub published: Option<String>,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub descriptions: Vec<NvdDescription>,
    #[serde(default)]
    pub metrics: Option<NvdMetrics>,
    #[serde(default)]
    pub weaknesses: Vec<NvdWeakness>,
    #[serde(default)]
    pub references: Vec<NvdReference>,
}

#[derive(Debug, Deserialize)]
pub struct NvdDescription {
    pub lang: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NvdMetrics {
    #[serde(rename = "cvssMetricV31", default)]
    pub cvss_v31: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV30", default)]
    pub cvss_v30: Vec<NvdCvssMetric>,
    #[serde(rename = "cvssMetricV2", default)]
    pub cvss_v2: Vec<NvdCvssMetric>,
}

#[derive(Debug, Deserialize)]
pub struct NvdCvssMetric {
    #[serde(rename = "cvssData")]
    pub cvss_data: NvdCvssData,
    /// v2 carries baseSeverity here instead of inside cvssData
    #[serde(rename = "baseSeverity")]
    pub base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NvdCvssData {
    #[serde(rename = "baseScore")]
    pub base_score: Option<f64>,
    #[serde(rename = "vectorString")]
    pub vector_string: Option<String>,
    #[serde(rename = "baseSeverity")]
    pub base_severity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NvdWeakness {
    #[serde(default)]
    pub description: Vec<NvdDescription>,
}

#[derive(Debug, Deserialize)]
pub struct NvdReference {
    pub url: String,
    pub source: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

// ============================================================================
// WIRE FORMATS (exploitation catalog)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct KevCatalogResponse {
    #[serde(default)]
    pub vulnerabilities: Vec<KevEntry>,
}

#[derive(Debug, Deserialize)]
pub struct KevEntry {
    #[serde(rename = "cveID")]
    pub cve_id: Option<String>,
    #[serde(rename = "vendorProject", default)]
    pub vendor_project: String,
    #[serde(default)]
    pub product: String,
    #[serde(rename = "vulnerabilityName", default)]
    pub vulnerability_name: String,
    #[serde(rename = "dateAdded")]
    pub date_added: Option<String>,
    #[serde(rename = "shortDescription", default)]
    pub short_description: String,
    #[serde(rename = "requiredAction", default)]
    pub required_action: String,
    #[serde(rename = "dueDate")]
    pub due_date: Option<String>,
    #[serde(rename = "knownRansomwareCampaignUse", default)]
    pub known_ransomware_campaign_use: String,
}
