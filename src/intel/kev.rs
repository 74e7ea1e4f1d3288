//! Exploitation Catalog Client
//!
//! Fetches the CISA Known Exploited Vulnerabilities feed and answers
//! membership probes from a TTL-bound in-memory copy, so per-identifier
//! checks do not refetch the full catalog.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::constants::{KEV_CACHE_TTL_SECS, KEV_CATALOG_URL, REQUEST_TIMEOUT_SECS, USER_AGENT};

use super::types::{ExploitationRecord, IntelError, KevCatalogResponse, KevEntry};

// ============================================================================
// CLIENT
// ============================================================================

struct CachedCatalog {
    /// Shared so per-identifier probes never copy the catalog
    records: Arc<Vec<ExploitationRecord>>,
    fetched_at: i64,
}

pub struct KevClient {
    url: String,
    agent: ureq::Agent,
    cache: Mutex<Option<CachedCatalog>>,
}

impl KevClient {
    pub fn new() -> Self {
        Self::with_url(KEV_CATALOG_URL)
    }

    /// Custom feed URL, used by tests against a local stub.
    pub fn with_url(url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build();
        Self {
            url: url.to_string(),
            agent,
            cache: Mutex::new(None),
        }
    }

    fn fetch_catalog(&self) -> Result<Vec<ExploitationRecord>, IntelError> {
        let body = self
            .agent
            .get(&self.url)
            .set("User-Agent", USER_AGENT)
            .call()?
            .into_string()?;
        let parsed: KevCatalogResponse = serde_json::from_str(&body)?;
        let records = parsed
            .vulnerabilities
            .into_iter()
            .filter_map(parse_entry)
            .collect();
        Ok(records)
    }

    /// Return the cached catalog, refetching when stale. Propagates the
    /// fetch error only when no usable copy exists at all.
    fn catalog(&self) -> Result<Arc<Vec<ExploitationRecord>>, IntelError> {
        let now = Utc::now().timestamp();
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if now - cached.fetched_at < KEV_CACHE_TTL_SECS {
                    return Ok(Arc::clone(&cached.records));
                }
            }
        }

        match self.fetch_catalog() {
            Ok(records) => {
                log::info!("Fetched exploitation catalog ({} entries)", records.len());
                let records = Arc::new(records);
                let mut cache = self.cache.lock();
                *cache = Some(CachedCatalog {
                    records: Arc::clone(&records),
                    fetched_at: now,
                });
                Ok(records)
            }
            Err(e) => {
                // A stale copy beats no answer
                let cache = self.cache.lock();
                if let Some(cached) = cache.as_ref() {
                    log::warn!(
                        "Exploitation catalog refresh failed ({}), serving stale copy",
                        e
                    );
                    return Ok(Arc::clone(&cached.records));
                }
                Err(e)
            }
        }
    }

    /// Look up one identifier in the catalog. `Ok(None)` means it is not
    /// known-exploited. Only the matching record is copied out.
    pub fn fetch_by_id(&self, id: &str) -> Result<Option<ExploitationRecord>, IntelError> {
        let records = self.catalog()?;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    /// Full catalog; empty on failure (callers treat the catalog as
    /// best-effort enrichment, never a hard dependency).
    pub fn fetch_full_catalog(&self) -> Vec<ExploitationRecord> {
        match self.catalog() {
            Ok(records) => records.as_ref().clone(),
            Err(e) => {
                log::error!("Could not fetch exploitation catalog: {}", e);
                Vec::new()
            }
        }
    }
}

impl Default for KevClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Entries without an identifier are dropped.
fn parse_entry(entry: KevEntry) -> Option<ExploitationRecord> {
    let id = entry.cve_id?;
    Some(ExploitationRecord {
        id,
        vendor: entry.vendor_project,
        product: entry.product,
        name: entry.vulnerability_name,
        date_added: entry.date_added,
        short_description: entry.short_description,
        required_action: entry.required_action,
        due_date: entry.due_date,
        ransomware_use: entry.known_ransomware_campaign_use,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "vulnerabilities": [
            {
                "cveID": "CVE-2023-1111",
                "vendorProject": "ExampleCorp",
                "product": "Widget Server",
                "vulnerabilityName": "ExampleCorp Widget Server RCE",
                "dateAdded": "2023-05-01",
                "shortDescription": "Remote code execution in Widget Server.",
                "requiredAction": "Apply vendor patch.",
                "dueDate": "2023-05-22",
                "knownRansomwareCampaignUse": "Known"
            },
            {
                "vendorProject": "NoId",
                "product": "Dropped"
            }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let parsed: KevCatalogResponse = serde_json::from_str(SAMPLE).unwrap();
        let records: Vec<_> = parsed
            .vulnerabilities
            .into_iter()
            .filter_map(parse_entry)
            .collect();

        // The entry without an identifier is dropped
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.id, "CVE-2023-1111");
        assert_eq!(r.vendor, "ExampleCorp");
        assert_eq!(r.product, "Widget Server");
        assert_eq!(r.ransomware_use, "Known");
        assert_eq!(r.due_date.as_deref(), Some("2023-05-22"));
    }

    #[test]
    fn test_by_id_probe_served_from_cache() {
        let client = KevClient::with_url("http://127.0.0.1:0/unreachable");
        let parsed: KevCatalogResponse = serde_json::from_str(SAMPLE).unwrap();
        let records: Vec<_> = parsed
            .vulnerabilities
            .into_iter()
            .filter_map(parse_entry)
            .collect();
        *client.cache.lock() = Some(CachedCatalog {
            records: Arc::new(records),
            fetched_at: Utc::now().timestamp(),
        });

        // Fresh cache answers probes without touching the network
        let found = client.fetch_by_id("CVE-2023-1111").unwrap();
        assert_eq!(found.unwrap().vendor, "ExampleCorp");
        assert!(client.fetch_by_id("CVE-2020-0000").unwrap().is_none());
        assert_eq!(client.fetch_full_catalog().len(), 1);
    }

    #[test]
    fn test_parse_empty_catalog() {
        let parsed: KevCatalogResponse = serde_json::from_str(r#"{"vulnerabilities": []}"#).unwrap();
        assert!(parsed.vulnerabilities.is_empty());
    }
}
