//! vulnwatch - Vulnerability Alert Resolution & Emission Core
//!
//! Library core for a chat-facing vulnerability alerting service:
//! scans message text for CVE identifiers, resolves layered guild/channel
//! alerting policy from a local SQLite store, enriches identifiers from
//! the NVD CVE API and the CISA KEV catalog, gates on a severity floor
//! and emits rate-limited notifications through a pluggable sink. Also
//! provides a filtered recent-vulnerability query engine and shared
//! pipeline statistics.
//!
//! Platform connection, command registration and notification rendering
//! live with the embedding application, not here.

pub mod constants;
pub mod intel;
pub mod pipeline;
pub mod policy;
pub mod query;
pub mod scanner;
pub mod severity;
pub mod stats;
