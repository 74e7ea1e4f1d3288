//! Primary Vulnerability Source Client
//!
//! Fetches vulnerability records from the NVD CVE API 2.0, by identifier
//! and by recent-publication window. Blocking calls with an explicit
//! timeout; retry policy lives with the caller's deployment, not here.

use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::constants::{NVD_API_BASE, NVD_DETAIL_BASE, REQUEST_TIMEOUT_SECS, USER_AGENT};

use super::types::{
    IntelError, NvdApiResponse, NvdCve, NvdCvssMetric, Reference, VulnerabilityRecord,
};

// ============================================================================
// CLIENT
// ============================================================================

/// Page size for recent-window requests
const RESULTS_PER_PAGE: &str = "2000";

pub struct NvdClient {
    base_url: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl NvdClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(NVD_API_BASE, api_key)
    }

    /// Custom base URL, used by tests against a local stub.
    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            base_url: base_url.to_string(),
            api_key,
            agent,
        }
    }

    fn request(&self, params: &[(&str, &str)]) -> Result<NvdApiResponse, IntelError> {
        let mut req = self.agent.get(&self.base_url).set("User-Agent", USER_AGENT);
        if let Some(key) = &self.api_key {
            req = req.set("apiKey", key);
        }
        for (k, v) in params {
            req = req.query(k, v);
        }
        let body = req.call()?.into_string()?;
        let parsed: NvdApiResponse = serde_json::from_str(&body)?;
        Ok(parsed)
    }

    /// Fetch one record by identifier. `Ok(None)` means the identifier is
    /// valid but unknown upstream.
    pub fn fetch_by_id(&self, id: &str) -> Result<Option<VulnerabilityRecord>, IntelError> {
        let response = match self.request(&[("cveId", id)]) {
            Ok(r) => r,
            Err(IntelError::Status { status: 404 }) => return Ok(None),
            Err(e) => return Err(e),
        };

        match response.vulnerabilities.into_iter().next() {
            Some(item) => Ok(Some(parse_record(item.cve))),
            None => {
                log::debug!("No vulnerability data for {} in upstream response", id);
                Ok(None)
            }
        }
    }

    /// Fetch all records published in the last `window_days` days,
    /// following pagination until the whole window is collected. An error
    /// on any page is a hard failure for the caller.
    pub fn fetch_recent(&self, window_days: u32) -> Result<Vec<VulnerabilityRecord>, IntelError> {
        let end = Utc::now();
        let start = end - ChronoDuration::days(i64::from(window_days));
        let start_s = start.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
        let end_s = end.format("%Y-%m-%dT%H:%M:%S%.3f").to_string();

        let mut records: Vec<VulnerabilityRecord> = Vec::new();
        loop {
            let start_index = records.len().to_string();
            let response = self.request(&[
                ("pubStartDate", start_s.as_str()),
                ("pubEndDate", end_s.as_str()),
                ("resultsPerPage", RESULTS_PER_PAGE),
                ("startIndex", start_index.as_str()),
            ])?;

            let page_len = response.vulnerabilities.len();
            records.extend(
                response
                    .vulnerabilities
                    .into_iter()
                    .map(|item| parse_record(item.cve)),
            );

            if !more_pages(records.len(), page_len, response.total_results) {
                break;
            }
            log::debug!(
                "Fetched {}/{} recent records, requesting next page",
                records.len(),
                response.total_results.unwrap_or(0)
            );
        }
        Ok(records)
    }
}

/// A further page exists when the upstream total is known and not yet
/// collected. An empty page stops the loop even when the reported total
/// claims more, so a lying upstream cannot spin us forever.
fn more_pages(collected: usize, page_len: usize, total: Option<usize>) -> bool {
    page_len > 0 && total.map_or(false, |t| collected < t)
}

// ============================================================================
// PARSING
// ============================================================================

fn parse_record(cve: NvdCve) -> VulnerabilityRecord {
    let description = cve
        .descriptions
        .iter()
        .find(|d| d.lang == "en")
        .map(|d| d.value.clone())
        .unwrap_or_else(|| "No description available".to_string());

    let (score, score_version, vector) = match &cve.metrics {
        Some(metrics) => {
            if let Some(m) = metrics.cvss_v31.first() {
                parse_cvss(m, "3.1")
            } else if let Some(m) = metrics.cvss_v30.first() {
                parse_cvss(m, "3.0")
            } else if let Some(m) = metrics.cvss_v2.first() {
                parse_cvss(m, "2.0")
            } else {
                (None, None, None)
            }
        }
        None => (None, None, None),
    };

    let mut weaknesses: Vec<String> = cve
        .weaknesses
        .iter()
        .flat_map(|w| &w.description)
        .filter(|d| d.lang == "en" && d.value.starts_with("CWE-"))
        .map(|d| d.value.clone())
        .collect();
    weaknesses.sort();
    weaknesses.dedup();

    let references = cve
        .references
        .into_iter()
        .map(|r| Reference {
            url: r.url,
            source: r.source,
            tags: r.tags,
        })
        .collect();

    let link = format!("{}{}", NVD_DETAIL_BASE, cve.id);

    VulnerabilityRecord {
        description,
        score,
        score_version,
        vector,
        weaknesses,
        published: parse_timestamp(cve.published.as_deref(), &cve.id),
        modified: parse_timestamp(cve.last_modified.as_deref(), &cve.id),
        link,
        references,
        source: "NVD",
        id: cve.id,
    }
}

fn parse_cvss(
    metric: &NvdCvssMetric,
    version: &str,
) -> (Option<f64>, Option<String>, Option<String>) {
    let score = metric.cvss_data.base_score;
    let vector = metric.cvss_data.vector_string.clone();
    // v3 carries baseSeverity inside cvssData, v2 alongside it
    let severity = metric
        .cvss_data
        .base_severity
        .as_deref()
        .or(metric.base_severity.as_deref());
    let score_version = match severity {
        Some(s) if !s.is_empty() => Some(format!("{} ({})", version, s)),
        _ => Some(version.to_string()),
    };
    (score, score_version, vector)
}

/// Parse an upstream ISO-8601 timestamp. Unparsable values fold to `None`
/// so downstream sorting stays total.
fn parse_timestamp(raw: Option<&str>, id: &str) -> Option<DateTime<Utc>> {
    let raw = raw?;
    // Upstream omits the offset on some records
    let with_offset = if raw.ends_with('Z') || raw.contains('+') {
        raw.to_string()
    } else {
        format!("{}Z", raw)
    };
    match DateTime::parse_from_rfc3339(&with_offset) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(_) => {
            log::warn!("Could not parse timestamp '{}' for {}", raw, id);
            None
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
