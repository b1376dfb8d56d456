//! Durability statistics and telemetry.
//!
//! Counters are atomic and can be read while operations are in progress;
//! they feed the INFO-style snapshot exposed by
//! [`crate::manager::DurabilityManager::stats`].

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Internal counters maintained by the writer, recovery, and manager.
///
/// All values are monotonically increasing.
#[derive(Debug, Default)]
pub struct DurabilityMetrics {
    /// Records appended to the log.
    records_appended: AtomicU64,
    /// Bytes appended to the log.
    bytes_appended: AtomicU64,
    /// Explicit fsyncs performed.
    syncs: AtomicU64,
    /// Compactions completed successfully.
    compactions: AtomicU64,
    /// Compactions that failed.
    compactions_failed: AtomicU64,
    /// Recovery passes run.
    recoveries: AtomicU64,
    /// Records replayed across all recovery passes.
    records_replayed: AtomicU64,
    /// Records skipped as corrupt across all recovery passes.
    records_skipped: AtomicU64,
}

impl DurabilityMetrics {
    /// Creates a new metrics instance with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_append(&self, bytes: u64) {
        self.records_appended.fetch_add(1, Ordering::Relaxed);
        self.bytes_appended.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_sync(&self) {
        self.syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_compaction_failure(&self) {
        self.compactions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_recovery(&self, replayed: u64, skipped: u64) {
        self.recoveries.fetch_add(1, Ordering::Relaxed);
        self.records_replayed.fetch_add(replayed, Ordering::Relaxed);
        self.records_skipped.fetch_add(skipped, Ordering::Relaxed);
    }

    /// Records appended to the log so far.
    #[must_use]
    pub fn records_appended(&self) -> u64 {
        self.records_appended.load(Ordering::Relaxed)
    }

    /// Bytes appended to the log so far.
    #[must_use]
    pub fn bytes_appended(&self) -> u64 {
        self.bytes_appended.load(Ordering::Relaxed)
    }

    /// Explicit fsyncs performed so far.
    #[must_use]
    pub fn syncs(&self) -> u64 {
        self.syncs.load(Ordering::Relaxed)
    }

    /// Compactions completed successfully so far.
    #[must_use]
    pub fn compactions(&self) -> u64 {
        self.compactions.load(Ordering::Relaxed)
    }

    /// Compactions that failed so far.
    #[must_use]
    pub fn compactions_failed(&self) -> u64 {
        self.compactions_failed.load(Ordering::Relaxed)
    }

    /// Recovery passes run so far.
    #[must_use]
    pub fn recoveries(&self) -> u64 {
        self.recoveries.load(Ordering::Relaxed)
    }

    /// Records replayed across all recovery passes.
    #[must_use]
    pub fn records_replayed(&self) -> u64 {
        self.records_replayed.load(Ordering::Relaxed)
    }

    /// Records skipped as corrupt across all recovery passes.
    #[must_use]
    pub fn records_skipped(&self) -> u64 {
        self.records_skipped.load(Ordering::Relaxed)
    }
}

/// Read-only snapshot of durability state for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurabilityStats {
    /// Whether persistence is enabled.
    pub enabled: bool,
    /// Unix timestamp of the last completed fsync, 0 if none yet.
    pub last_sync_unix: i64,
    /// Path of the append-only log, `None` when persistence is disabled.
    pub log_path: Option<PathBuf>,
    /// Records appended since startup.
    pub records_appended: u64,
    /// Bytes appended since startup.
    pub bytes_appended: u64,
    /// Fsyncs performed since startup.
    pub syncs: u64,
    /// Compactions completed since startup.
    pub compactions: u64,
    /// Records replayed by recovery since startup.
    pub records_replayed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = DurabilityMetrics::new();
        assert_eq!(metrics.records_appended(), 0);
        assert_eq!(metrics.syncs(), 0);
        assert_eq!(metrics.compactions(), 0);
    }

    #[test]
    fn append_counter_tracks_bytes() {
        let metrics = DurabilityMetrics::new();
        metrics.record_append(10);
        metrics.record_append(32);

        assert_eq!(metrics.records_appended(), 2);
        assert_eq!(metrics.bytes_appended(), 42);
    }

    #[test]
    fn recovery_counters_accumulate() {
        let metrics = DurabilityMetrics::new();
        metrics.record_recovery(5, 1);
        metrics.record_recovery(3, 0);

        assert_eq!(metrics.recoveries(), 2);
        assert_eq!(metrics.records_replayed(), 8);
        assert_eq!(metrics.records_skipped(), 1);
    }
}
