//! External Intelligence Module
//!
//! Wraps the two upstream data sources behind one enrichment interface:
//! the primary vulnerability-record source and the exploited-in-the-wild
//! catalog. Timeout/retry machinery belongs to the implementations; the
//! pipeline and query engine only see this trait.
//!
//! ## Structure
//! - `types`: VulnerabilityRecord, ExploitationRecord, IntelError, wire formats
//! - `nvd`: primary source client (CVE API 2.0)
//! - `kev`: exploitation catalog client (KEV feed, TTL-cached)

pub mod kev;
pub mod nvd;
pub mod types;

pub use kev::KevClient;
pub use nvd::NvdClient;
pub use types::{ExploitationRecord, IntelError, Reference, VulnerabilityRecord};

// ============================================================================
// ENRICHMENT INTERFACE
// ============================================================================

/// Fetch operations consumed by the alert pipeline and the query engine.
///
/// `Ok(None)` from the by-id operations means "valid identifier, no
/// record" and is distinct from an error. `fetch_recent` errors are hard
/// failures; `fetch_full_exploitation_catalog` degrades to empty.
pub trait EnrichmentClient: Send + Sync {
    fn fetch_by_id(&self, id: &str) -> Result<Option<VulnerabilityRecord>, IntelError>;

    fn fetch_recent(&self, window_days: u32) -> Result<Vec<VulnerabilityRecord>, IntelError>;

    fn fetch_exploitation_by_id(&self, id: &str)
        -> Result<Option<ExploitationRecord>, IntelError>;

    fn fetch_full_exploitation_catalog(&self) -> Vec<ExploitationRecord>;
}

/// Production client combining both upstream sources.
pub struct HttpEnrichmentClient {
    nvd: NvdClient,
    kev: KevClient,
}

impl HttpEnrichmentClient {
    pub fn new(nvd_api_key: Option<String>) -> Self {
        Self {
            nvd: NvdClient::new(nvd_api_key),
            kev: KevClient::new(),
        }
    }

    pub fn with_clients(nvd: NvdClient, kev: KevClient) -> Self {
        Self { nvd, kev }
    }
}

impl EnrichmentClient for HttpEnrichmentClient {
    fn fetch_by_id(&self, id: &str) -> Result<Option<VulnerabilityRecord>, IntelError> {
        self.nvd.fetch_by_id(id)
    }

    fn fetch_recent(&self, window_days: u32) -> Result<Vec<VulnerabilityRecord>, IntelError> {
        self.nvd.fetch_recent(window_days)
    }

    fn fetch_exploitation_by_id(
        &self,
        id: &str,
    ) -> Result<Option<ExploitationRecord>, IntelError> {
        self.kev.fetch_by_id(id)
    }

    fn fetch_full_exploitation_catalog(&self) -> Vec<ExploitationRecord> {
        self.kev.fetch_full_catalog()
    }
}
