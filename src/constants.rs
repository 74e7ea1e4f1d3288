//! Central Configuration Constants
//!
//! Single source of truth for pipeline limits, feed URLs and API defaults.

/// Maximum number of identifiers processed from a single message.
/// Additional identifiers are dropped and reported via a truncation notice.
pub const MAX_IDS_PER_MESSAGE: usize = 5;

/// Delay enforced after every notification send (milliseconds).
/// Applies between the vulnerability and exploitation alerts of one
/// identifier as well as between successive identifiers.
pub const SEND_DELAY_MS: u64 = 1500;

/// How long a truncation notice is allowed to live before the renderer
/// may expire it (seconds).
pub const NOTICE_EXPIRE_SECS: u64 = 30;

/// Default suppression window for re-alerting the same
/// (channel, identifier) pair (seconds).
pub const RECENT_ALERT_CACHE_SECS: u64 = 20;

/// NVD CVE API 2.0 base URL
pub const NVD_API_BASE: &str = "https://services.nvd.nist.gov/rest/json/cves/2.0";

/// CISA Known Exploited Vulnerabilities catalog feed
pub const KEV_CATALOG_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

/// Canonical record link prefix (append the identifier)
pub const NVD_DETAIL_BASE: &str = "https://nvd.nist.gov/vuln/detail/";

/// HTTP timeout for upstream calls (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// How long a fetched exploitation catalog stays usable (seconds)
pub const KEV_CACHE_TTL_SECS: i64 = 3600;

/// User-Agent sent to both upstream providers
pub const USER_AGENT: &str = concat!("vulnwatch/", env!("CARGO_PKG_VERSION"));

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
