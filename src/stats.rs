//! Pipeline Statistics Counters
//!
//! Process-lifetime counters shared by every concurrent pipeline
//! invocation. All increments go through one mutex so snapshots are
//! internally consistent.

use parking_lot::Mutex;

// ============================================================================
// COUNTERS
// ============================================================================

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct StatsSnapshot {
    /// Messages that reached the scan stage
    pub messages_scanned: u64,
    /// Identifier lookups attempted against the primary source
    pub lookups: u64,
    /// Lookups that returned a record
    pub successes: u64,
    /// Caught upstream failures (fetch or enrichment)
    pub upstream_errors: u64,
}

/// Shared, mutex-guarded counters. Construct once, hand an `Arc` to every
/// pipeline instance.
#[derive(Debug, Default)]
pub struct StatsCounters {
    inner: Mutex<StatsSnapshot>,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message_scanned(&self) {
        self.inner.lock().messages_scanned += 1;
    }

    pub fn record_lookup(&self) {
        self.inner.lock().lookups += 1;
    }

    pub fn record_success(&self) {
        self.inner.lock().successes += 1;
    }

    pub fn record_error(&self) {
        self.inner.lock().upstream_errors += 1;
    }

    /// Consistent copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.lock().clone()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increments() {
        let stats = StatsCounters::new();
        stats.record_message_scanned();
        stats.record_lookup();
        stats.record_lookup();
        stats.record_success();
        stats.record_error();

        let snap = stats.snapshot();
        assert_eq!(snap.messages_scanned, 1);
        assert_eq!(snap.lookups, 2);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.upstream_errors, 1);
    }

    #[test]
    fn test_concurrent_increments() {
        let stats = Arc::new(StatsCounters::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    stats.record_lookup();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stats.snapshot().lookups, 800);
    }
}
