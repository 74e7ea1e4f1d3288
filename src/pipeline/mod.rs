//! Alert Pipeline
//!
//! Per-message orchestration: guard checks, policy resolution, identifier
//! scanning, capped sequential lookup/gate/enrich/emit, and the final
//! truncation notice. One message's batch runs strictly sequentially; the
//! inter-send delay doubles as backpressure toward the sink.
//!
//! ## Structure
//! - `notification`: alert payloads and the sink trait

pub mod notification;

pub use notification::{Notification, NotificationSink, SinkError};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::constants::{
    MAX_IDS_PER_MESSAGE, NOTICE_EXPIRE_SECS, NVD_DETAIL_BASE, RECENT_ALERT_CACHE_SECS,
    SEND_DELAY_MS,
};
use crate::intel::EnrichmentClient;
use crate::policy::{resolve, PolicyStore};
use crate::scanner;
use crate::severity::{self, Severity};
use crate::stats::StatsCounters;

// ============================================================================
// EVENTS & DISPOSITIONS
// ============================================================================

/// One inbound message event, as delivered by the platform adapter.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub guild_id: u64,
    pub channel_id: u64,
    pub author_is_bot: bool,
    pub is_direct: bool,
    pub content: String,
}

/// Why a message produced no processing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BotAuthor,
    DirectMessage,
    EmptyContent,
    PolicyDisabled,
    NoIdentifiers,
}

/// Outcome tallies for one processed message batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Distinct identifiers found before capping
    pub distinct_found: usize,
    /// Identifiers that entered the per-identifier loop
    pub processed: usize,
    pub alerts_sent: usize,
    pub exploitation_alerts_sent: usize,
    pub suppressed: usize,
    pub gated: usize,
    pub not_found: usize,
    pub failed: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageDisposition {
    Skipped(SkipReason),
    Processed(BatchSummary),
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Enforced after every emission, vulnerability and exploitation alike
    pub send_delay: Duration,
    /// How long a (channel, identifier) pair stays suppressed after an alert
    pub suppression_window: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_millis(SEND_DELAY_MS),
            suppression_window: Duration::from_secs(RECENT_ALERT_CACHE_SECS),
        }
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct AlertPipeline<C: EnrichmentClient, S: NotificationSink> {
    store: Arc<PolicyStore>,
    client: C,
    sink: S,
    stats: Arc<StatsCounters>,
    config: PipelineConfig,
    /// (channel, identifier) -> unix seconds of the last alert
    recent_alerts: Mutex<HashMap<(u64, String), i64>>,
}

impl<C: EnrichmentClient, S: NotificationSink> AlertPipeline<C, S> {
    pub fn new(store: Arc<PolicyStore>, client: C, sink: S, stats: Arc<StatsCounters>) -> Self {
        Self::with_config(store, client, sink, stats, PipelineConfig::default())
    }

    pub fn with_config(
        store: Arc<PolicyStore>,
        client: C,
        sink: S,
        stats: Arc<StatsCounters>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            client,
            sink,
            stats,
            config,
            recent_alerts: Mutex::new(HashMap::new()),
        }
    }

    /// Run one message through the full state machine. Reject states are
    /// silent no-ops; per-identifier failures never abort the batch.
    pub fn process_message(&self, event: &MessageEvent) -> MessageDisposition {
        if event.author_is_bot {
            return MessageDisposition::Skipped(SkipReason::BotAuthor);
        }
        if event.is_direct {
            return MessageDisposition::Skipped(SkipReason::DirectMessage);
        }
        if event.content.trim().is_empty() {
            return MessageDisposition::Skipped(SkipReason::EmptyContent);
        }

        let policy = resolve(&self.store, event.guild_id, event.channel_id);
        if !policy.enabled {
            return MessageDisposition::Skipped(SkipReason::PolicyDisabled);
        }

        self.stats.record_message_scanned();

        let hit = scanner::scan(&event.content);
        if hit.is_empty() {
            return MessageDisposition::Skipped(SkipReason::NoIdentifiers);
        }

        let mut summary = BatchSummary {
            distinct_found: hit.distinct_found,
            truncated: hit.distinct_found > MAX_IDS_PER_MESSAGE,
            ..BatchSummary::default()
        };

        for id in hit.ids.iter().take(MAX_IDS_PER_MESSAGE) {
            summary.processed += 1;
            self.process_identifier(event, id, policy.verbose, policy.severity_threshold, &mut summary);
        }

        // One notice per message, never one per dropped identifier
        if summary.truncated {
            let text = format!(
                "Found {} identifiers, processed the first {}.",
                summary.distinct_found, MAX_IDS_PER_MESSAGE
            );
            if let Err(e) = self.sink.send_notice(&text, Some(NOTICE_EXPIRE_SECS)) {
                log::warn!("Could not send truncation notice: {}", e);
            }
        }

        MessageDisposition::Processed(summary)
    }

    fn process_identifier(
        &self,
        event: &MessageEvent,
        id: &str,
        verbose: bool,
        threshold: Severity,
        summary: &mut BatchSummary,
    ) {
        // Suppressed identifiers consume no lookup
        if self.recently_alerted(event.channel_id, id) {
            log::debug!(
                "Suppressing re-alert for {} in channel {}",
                id,
                event.channel_id
            );
            summary.suppressed += 1;
            return;
        }

        if !scanner::is_valid_id(id) {
            log::warn!("Scanner produced invalid identifier '{}', skipping", id);
            summary.failed += 1;
            return;
        }

        self.stats.record_lookup();
        let record = match self.client.fetch_by_id(id) {
            Ok(Some(record)) => record,
            Ok(None) => {
                log::debug!("No record found for {}", id);
                summary.not_found += 1;
                return;
            }
            Err(e) => {
                log::error!("Lookup failed for {}: {}", id, e);
                self.stats.record_error();
                summary.failed += 1;
                return;
            }
        };
        self.stats.record_success();

        // Gate before enrichment so suppressed records cost one call, not two
        if !severity::passes(record.score, threshold) {
            log::debug!(
                "{} (score {:?}) below {} threshold, suppressed",
                id,
                record.score,
                threshold
            );
            summary.gated += 1;
            return;
        }

        // Enrichment failure degrades to "not flagged", never fails the id
        let exploitation = match self.client.fetch_exploitation_by_id(id) {
            Ok(found) => found,
            Err(e) => {
                log::error!("Exploitation lookup failed for {}: {}", id, e);
                self.stats.record_error();
                None
            }
        };

        let alert = Notification::vulnerability(&record, verbose);
        if let Err(e) = self.sink.send(&alert) {
            log::error!("Could not send alert for {}: {}", id, e);
            summary.failed += 1;
            return;
        }
        summary.alerts_sent += 1;
        self.mark_alerted(event.channel_id, id);
        std::thread::sleep(self.config.send_delay);

        if let Some(exploited) = exploitation {
            let link = format!("{}{}", NVD_DETAIL_BASE, id);
            let alert = Notification::exploitation(&exploited, link, verbose);
            match self.sink.send(&alert) {
                Ok(()) => summary.exploitation_alerts_sent += 1,
                Err(e) => {
                    log::error!("Could not send exploitation alert for {}: {}", id, e);
                    summary.failed += 1;
                }
            }
            std::thread::sleep(self.config.send_delay);
        }
    }

    /// Consistent view of the shared counters.
    pub fn stats(&self) -> Arc<StatsCounters> {
        Arc::clone(&self.stats)
    }

    fn recently_alerted(&self, channel_id: u64, id: &str) -> bool {
        let now = Utc::now().timestamp();
        let window = self.config.suppression_window.as_secs() as i64;
        let mut cache = self.recent_alerts.lock();
        // Opportunistic sweep keeps the map from growing unbounded
        cache.retain(|_, alerted_at| now - *alerted_at < window);
        cache.contains_key(&(channel_id, id.to_string()))
    }

    fn mark_alerted(&self, channel_id: u64, id: &str) {
        let now = Utc::now().timestamp();
        self.recent_alerts
            .lock()
            .insert((channel_id, id.to_string()), now);
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intel::{ExploitationRecord, IntelError, VulnerabilityRecord};
    use crate::severity::Severity;

    // ------------------------------------------------------------------
    // Fakes
    // ------------------------------------------------------------------

    #[derive(Default)]
    struct FakeClient {
        records: HashMap<String, VulnerabilityRecord>,
        exploited: HashMap<String, ExploitationRecord>,
        failing_ids: Vec<String>,
        failing_exploitation_ids: Vec<String>,
    }

    impl EnrichmentClient for FakeClient {
        fn fetch_by_id(&self, id: &str) -> Result<Option<VulnerabilityRecord>, IntelError> {
            if self.failing_ids.iter().any(|f| f == id) {
                return Err(IntelError::Network("connection reset".to_string()));
            }
            Ok(self.records.get(id).cloned())
        }

        fn fetch_recent(&self, _window_days: u32) -> Result<Vec<VulnerabilityRecord>, IntelError> {
            Ok(self.records.values().cloned().collect())
        }

        fn fetch_exploitation_by_id(
            &self,
            id: &str,
        ) -> Result<Option<ExploitationRecord>, IntelError> {
            if self.failing_exploitation_ids.iter().any(|f| f == id) {
                return Err(IntelError::Network("connection reset".to_string()));
            }
            Ok(self.exploited.get(id).cloned())
        }

        fn fetch_full_exploitation_catalog(&self) -> Vec<ExploitationRecord> {
            self.exploited.values().cloned().collect()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Notification>>,
        notices: Mutex<Vec<(String, Option<u64>)>>,
    }

    impl NotificationSink for RecordingSink {
        fn send(&self, notification: &Notification) -> Result<(), SinkError> {
            self.sent.lock().push(notification.clone());
            Ok(())
        }

        fn send_notice(&self, text: &str, expire_after_secs: Option<u64>) -> Result<(), SinkError> {
            self.notices.lock().push((text.to_string(), expire_after_secs));
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn record(id: &str, score: Option<f64>) -> VulnerabilityRecord {
        VulnerabilityRecord {
            id: id.to_string(),
            description: format!("Description of {}", id),
            score,
            score_version: score.map(|_| "3.1 (HIGH)".to_string()),
            vector: None,
            weaknesses: vec![],
            published: None,
            modified: None,
            link: format!("{}{}", NVD_DETAIL_BASE, id),
            references: vec![],
            source: "NVD",
        }
    }

    fn exploited(id: &str) -> ExploitationRecord {
        ExploitationRecord {
            id: id.to_string(),
            vendor: "Vendor".to_string(),
            product: "Product".to_string(),
            name: format!("{} exploitation", id),
            date_added: Some("2024-01-01".to_string()),
            short_description: "Exploited in the wild.".to_string(),
            required_action: "Patch.".to_string(),
            due_date: Some("2024-01-22".to_string()),
            ransomware_use: "Unknown".to_string(),
        }
    }

    fn store_with_guild(threshold: Severity, verbose: bool) -> Arc<PolicyStore> {
        let store = PolicyStore::open_in_memory().unwrap();
        store.set_guild_policy(1, true, verbose, threshold).unwrap();
        Arc::new(store)
    }

    fn pipeline(
        store: Arc<PolicyStore>,
        client: FakeClient,
    ) -> AlertPipeline<FakeClient, RecordingSink> {
        AlertPipeline::with_config(
            store,
            client,
            RecordingSink::default(),
            Arc::new(StatsCounters::new()),
            PipelineConfig {
                send_delay: Duration::from_millis(0),
                ..PipelineConfig::default()
            },
        )
    }

    fn event(content: &str) -> MessageEvent {
        MessageEvent {
            guild_id: 1,
            channel_id: 10,
            author_is_bot: false,
            is_direct: false,
            content: content.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Guards
    // ------------------------------------------------------------------

    #[test]
    fn test_bot_author_skipped_silently() {
        let p = pipeline(store_with_guild(Severity::All, false), FakeClient::default());
        let mut e = event("CVE-2024-0001");
        e.author_is_bot = true;

        assert_eq!(
            p.process_message(&e),
            MessageDisposition::Skipped(SkipReason::BotAuthor)
        );
        assert_eq!(p.stats.snapshot().messages_scanned, 0);
        assert!(p.sink.sent.lock().is_empty());
    }

    #[test]
    fn test_direct_message_skipped() {
        let p = pipeline(store_with_guild(Severity::All, false), FakeClient::default());
        let mut e = event("CVE-2024-0001");
        e.is_direct = true;
        assert_eq!(
            p.process_message(&e),
            MessageDisposition::Skipped(SkipReason::DirectMessage)
        );
    }

    #[test]
    fn test_empty_content_skipped() {
        let p = pipeline(store_with_guild(Severity::All, false), FakeClient::default());
        assert_eq!(
            p.process_message(&event("   ")),
            MessageDisposition::Skipped(SkipReason::EmptyContent)
        );
    }

    #[test]
    fn test_unknown_guild_skipped_no_counters() {
        let store = Arc::new(PolicyStore::open_in_memory().unwrap());
        let p = pipeline(store, FakeClient::default());
        assert_eq!(
            p.process_message(&event("CVE-2024-0001")),
            MessageDisposition::Skipped(SkipReason::PolicyDisabled)
        );
        assert_eq!(p.stats.snapshot().messages_scanned, 0);
    }

    #[test]
    fn test_no_identifiers_counts_scan_only() {
        let p = pipeline(store_with_guild(Severity::All, false), FakeClient::default());
        assert_eq!(
            p.process_message(&event("nothing interesting here")),
            MessageDisposition::Skipped(SkipReason::NoIdentifiers)
        );
        let snap = p.stats.snapshot();
        assert_eq!(snap.messages_scanned, 1);
        assert_eq!(snap.lookups, 0);
    }

    // ------------------------------------------------------------------
    // Emission
    // ------------------------------------------------------------------

    #[test]
    fn test_high_score_emits_standard_alert() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0001".to_string(), record("CVE-2024-0001", Some(8.0)));
        let p = pipeline(store_with_guild(Severity::High, false), client);

        let disp = p.process_message(&event("look at CVE-2024-0001"));
        let MessageDisposition::Processed(summary) = disp else {
            panic!("expected processed")
        };
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(summary.gated, 0);

        let sent = p.sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].verbose());
        assert_eq!(sent[0].title(), "CVE-2024-0001");

        let snap = p.stats.snapshot();
        assert_eq!(snap.lookups, 1);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.upstream_errors, 0);
    }

    #[test]
    fn test_low_score_gated_after_successful_fetch() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0002".to_string(), record("CVE-2024-0002", Some(3.0)));
        let p = pipeline(store_with_guild(Severity::High, false), client);

        let disp = p.process_message(&event("CVE-2024-0002"));
        let MessageDisposition::Processed(summary) = disp else {
            panic!("expected processed")
        };
        assert_eq!(summary.alerts_sent, 0);
        assert_eq!(summary.gated, 1);
        assert!(p.sink.sent.lock().is_empty());

        // Gating happens after the fetch, so the lookup still succeeded
        let snap = p.stats.snapshot();
        assert_eq!(snap.lookups, 1);
        assert_eq!(snap.successes, 1);
    }

    #[test]
    fn test_missing_score_gated_under_non_all_floor() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0003".to_string(), record("CVE-2024-0003", None));
        let p = pipeline(store_with_guild(Severity::Low, false), client);

        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-0003"))
        else {
            panic!("expected processed")
        };
        assert_eq!(summary.gated, 1);
        assert_eq!(summary.alerts_sent, 0);
    }

    #[test]
    fn test_verbose_override_applies_to_alert() {
        let store = store_with_guild(Severity::All, false);
        store
            .upsert_channel_policy(1, 10, Some(true), Some(Some(true)))
            .unwrap();

        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0004".to_string(), record("CVE-2024-0004", Some(9.8)));
        let p = pipeline(store, client);

        p.process_message(&event("CVE-2024-0004"));
        let sent = p.sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].verbose());
    }

    #[test]
    fn test_exploited_record_emits_two_alerts_in_order() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0005".to_string(), record("CVE-2024-0005", Some(9.0)));
        client
            .exploited
            .insert("CVE-2024-0005".to_string(), exploited("CVE-2024-0005"));
        let p = pipeline(store_with_guild(Severity::All, false), client);

        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-0005"))
        else {
            panic!("expected processed")
        };
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(summary.exploitation_alerts_sent, 1);

        let sent = p.sink.sent.lock();
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].is_exploitation_alert());
        assert!(sent[1].is_exploitation_alert());
    }

    // ------------------------------------------------------------------
    // Truncation & partial failure
    // ------------------------------------------------------------------

    #[test]
    fn test_cap_sends_single_truncation_notice() {
        let mut client = FakeClient::default();
        for i in 1..=7 {
            let id = format!("CVE-2024-100{}", i);
            client.records.insert(id.clone(), record(&id, Some(9.0)));
        }
        let p = pipeline(store_with_guild(Severity::All, false), client);

        let content = (1..=7)
            .map(|i| format!("CVE-2024-100{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let MessageDisposition::Processed(summary) = p.process_message(&event(&content)) else {
            panic!("expected processed")
        };

        assert_eq!(summary.distinct_found, 7);
        assert_eq!(summary.processed, 5);
        assert!(summary.truncated);
        assert_eq!(p.sink.sent.lock().len(), 5);

        let notices = p.sink.notices.lock();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].0.contains('7'));
        assert!(notices[0].0.contains('5'));
        assert_eq!(notices[0].1, Some(NOTICE_EXPIRE_SECS));
    }

    #[test]
    fn test_fetch_failure_does_not_abort_batch() {
        let mut client = FakeClient::default();
        client.failing_ids.push("CVE-2024-0001".to_string());
        client
            .records
            .insert("CVE-2024-0002".to_string(), record("CVE-2024-0002", Some(9.0)));
        let p = pipeline(store_with_guild(Severity::All, false), client);

        let MessageDisposition::Processed(summary) =
            p.process_message(&event("CVE-2024-0001 CVE-2024-0002"))
        else {
            panic!("expected processed")
        };
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.alerts_sent, 1);

        let snap = p.stats.snapshot();
        assert_eq!(snap.lookups, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.upstream_errors, 1);
    }

    #[test]
    fn test_enrichment_failure_degrades_to_unflagged() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0006".to_string(), record("CVE-2024-0006", Some(9.0)));
        client
            .failing_exploitation_ids
            .push("CVE-2024-0006".to_string());
        let p = pipeline(store_with_guild(Severity::All, false), client);

        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-0006"))
        else {
            panic!("expected processed")
        };
        // Vulnerability alert still goes out; exploitation alert does not
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(summary.exploitation_alerts_sent, 0);
        assert_eq!(p.stats.snapshot().upstream_errors, 1);
    }

    #[test]
    fn test_unknown_id_counts_not_found() {
        let p = pipeline(store_with_guild(Severity::All, false), FakeClient::default());
        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-9999"))
        else {
            panic!("expected processed")
        };
        assert_eq!(summary.not_found, 1);
        let snap = p.stats.snapshot();
        assert_eq!(snap.lookups, 1);
        assert_eq!(snap.successes, 0);
        assert_eq!(snap.upstream_errors, 0);
    }

    // ------------------------------------------------------------------
    // Re-alert suppression
    // ------------------------------------------------------------------

    #[test]
    fn test_repeat_alert_suppressed_without_lookup() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0007".to_string(), record("CVE-2024-0007", Some(9.0)));
        let p = pipeline(store_with_guild(Severity::All, false), client);

        p.process_message(&event("CVE-2024-0007"));
        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-0007"))
        else {
            panic!("expected processed")
        };

        assert_eq!(summary.suppressed, 1);
        assert_eq!(summary.alerts_sent, 0);
        // The second message consumed no lookup
        assert_eq!(p.stats.snapshot().lookups, 1);
        assert_eq!(p.sink.sent.lock().len(), 1);
    }

    #[test]
    fn test_suppression_expires_after_window() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0009".to_string(), record("CVE-2024-0009", Some(9.0)));
        let p = AlertPipeline::with_config(
            store_with_guild(Severity::All, false),
            client,
            RecordingSink::default(),
            Arc::new(StatsCounters::new()),
            PipelineConfig {
                send_delay: Duration::from_millis(0),
                suppression_window: Duration::from_secs(0),
            },
        );

        p.process_message(&event("CVE-2024-0009"));
        // A zero-length window means the cache entry expires immediately
        let MessageDisposition::Processed(summary) = p.process_message(&event("CVE-2024-0009"))
        else {
            panic!("expected processed")
        };
        assert_eq!(summary.suppressed, 0);
        assert_eq!(summary.alerts_sent, 1);
        assert_eq!(p.stats.snapshot().lookups, 2);
    }

    #[test]
    fn test_suppression_is_per_channel() {
        let mut client = FakeClient::default();
        client
            .records
            .insert("CVE-2024-0008".to_string(), record("CVE-2024-0008", Some(9.0)));
        let p = pipeline(store_with_guild(Severity::All, false), client);

        p.process_message(&event("CVE-2024-0008"));
        let mut other = event("CVE-2024-0008");
        other.channel_id = 11;
        let MessageDisposition::Processed(summary) = p.process_message(&other) else {
            panic!("expected processed")
        };
        assert_eq!(summary.suppressed, 0);
        assert_eq!(summary.alerts_sent, 1);
    }
}
