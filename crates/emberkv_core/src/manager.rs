//! Durability orchestration.
//!
//! [`DurabilityManager`] is the single integration point the command layer
//! talks to: it owns the log writer and the recovery engine, drives
//! lifecycle and periodic maintenance, schedules background compaction,
//! and exposes the configuration and statistics surfaces.

use crate::aof::{CommandKind, CompactionPermit, LogRecord, LogWriter};
use crate::config::DurabilityConfig;
use crate::error::DurabilityResult;
use crate::recovery::{LogValidation, RecoveryEngine, RecoveryReport};
use crate::stats::{DurabilityMetrics, DurabilityStats};
use crate::store::Store;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Orchestrates the append-only log writer and the recovery engine.
///
/// # Startup Ordering
///
/// Recovery writes into the store, not the log, so the intended sequence
/// is: construct the manager, run [`DurabilityManager::recover_on_startup`],
/// then [`DurabilityManager::start`] - opening the writer first would risk
/// a later recovery replaying records the current run already produced.
///
/// # Write Interception
///
/// The dispatcher calls [`DurabilityManager::record_if_mutating`] for
/// every command without pre-filtering; the manager is the authority on
/// which commands are durable. Call it after the mutation has been applied
/// to the store, so a concurrent compaction snapshot observes the effect.
#[derive(Debug)]
pub struct DurabilityManager {
    config: RwLock<DurabilityConfig>,
    writer: Option<Arc<LogWriter>>,
    recovery: RecoveryEngine,
    metrics: Arc<DurabilityMetrics>,
    compaction_task: Mutex<Option<JoinHandle<()>>>,
}

impl DurabilityManager {
    /// Creates a manager from a validated configuration.
    ///
    /// Bootstraps the data and temp directories and creates the log writer
    /// when persistence is enabled. The recovery engine is always created:
    /// a log left behind by a previous run is recoverable even while
    /// persistence is off.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DurabilityError::ConfigInvalid`] if the
    /// configuration fails validation, or
    /// [`crate::DurabilityError::Filesystem`] if a directory cannot be
    /// created.
    pub fn new(config: DurabilityConfig) -> DurabilityResult<Self> {
        config.validate()?;
        config.ensure_directories()?;

        let metrics = Arc::new(DurabilityMetrics::new());
        let writer = config.persistence_enabled.then(|| {
            Arc::new(LogWriter::new(
                config.log_path(),
                config.temp_dir.clone(),
                config.sync_policy,
                Arc::clone(&metrics),
            ))
        });
        let recovery = RecoveryEngine::new(config.log_path());

        Ok(Self {
            config: RwLock::new(config),
            writer,
            recovery,
            metrics,
            compaction_task: Mutex::new(None),
        })
    }

    /// Opens the log writer, if persistence is enabled.
    ///
    /// Call only after startup recovery has completed.
    ///
    /// # Errors
    ///
    /// Returns the writer's open error - missing directory, lock conflict,
    /// or a stopped writer.
    pub fn start(&self) -> DurabilityResult<()> {
        if let Some(writer) = &self.writer {
            writer.open()?;
        }
        tracing::info!(enabled = self.writer.is_some(), "durability manager started");
        Ok(())
    }

    /// Stops the manager: flushes, fsyncs, and releases the log handle.
    ///
    /// This is the terminal transition - no further writes are accepted
    /// and the writer never reopens. Blocks until any in-flight append and
    /// any background compaction task have finished.
    ///
    /// # Errors
    ///
    /// Returns the storage error from the final sync, if any; the writer
    /// is stopped regardless.
    pub fn stop(&self) -> DurabilityResult<()> {
        let result = match &self.writer {
            Some(writer) => writer.shutdown(),
            None => Ok(()),
        };

        // A compaction finishing after this point sees the stopped writer
        // and leaves the handle closed.
        if let Some(handle) = self.compaction_task.lock().take() {
            let _ = handle.join();
        }

        tracing::info!("durability manager stopped");
        result
    }

    /// Journals `command` if it is in the mutating set.
    ///
    /// Non-mutating commands succeed without writing anything. This is the
    /// sole hook the command layer calls.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DurabilityError::NotOpen`] when the writer is not
    /// started or already stopped, or the storage error from the append.
    pub fn record_if_mutating(&self, command: &str, args: &[String]) -> DurabilityResult<()> {
        let Some(writer) = &self.writer else {
            return Ok(());
        };
        let Some(kind) = CommandKind::from_name(command) else {
            return Ok(());
        };
        writer.append(&LogRecord::now(kind, args.to_vec()))
    }

    /// Schedules a compaction pass on a background task.
    ///
    /// Returns `false` immediately - without scheduling anything - when
    /// persistence is disabled or a compaction is already in flight;
    /// returns `true` once the task is scheduled. Completion is
    /// asynchronous and observable through the log output and
    /// [`DurabilityManager::stats`].
    pub fn trigger_compaction(&self, store: Arc<dyn Store>) -> bool {
        let Some(writer) = &self.writer else {
            return false;
        };
        let Some(permit) = CompactionPermit::acquire(writer) else {
            return false;
        };

        let mut slot = self.compaction_task.lock();
        // Reap the previous task; holding the permit guarantees it is no
        // longer compacting, so the join returns promptly.
        if let Some(handle) = slot.take() {
            let _ = handle.join();
        }

        let spawned = thread::Builder::new()
            .name("aof-compaction".into())
            .spawn(move || match permit.run(store.as_ref()) {
                Ok(stats) => tracing::info!(
                    live_keys = stats.live_keys,
                    bytes = stats.bytes_written,
                    "background compaction finished"
                ),
                Err(e) => tracing::warn!(error = %e, "background compaction failed"),
            });

        match spawned {
            Ok(handle) => {
                *slot = Some(handle);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to spawn compaction task");
                false
            }
        }
    }

    /// Runs one round of periodic maintenance.
    ///
    /// Intended to be invoked on a regular cadence by the host; drives the
    /// `everysec` sync policy. Returns whether a sync occurred.
    ///
    /// # Errors
    ///
    /// Returns the storage error if the sync fails.
    pub fn periodic_maintenance(&self) -> DurabilityResult<bool> {
        match &self.writer {
            Some(writer) => writer.maybe_sync(),
            None => Ok(false),
        }
    }

    /// Returns whether the log has crossed the configured compaction
    /// thresholds.
    #[must_use]
    pub fn needs_compaction(&self) -> bool {
        let Some(writer) = &self.writer else {
            return false;
        };
        let config = self.config.read();
        writer.needs_compaction(config.compaction_min_size, config.compaction_growth_factor)
    }

    /// Replays the log into `store`, if startup recovery is enabled.
    ///
    /// With recovery disabled the store is untouched and an empty success
    /// report is returned.
    pub fn recover_on_startup(&self, store: &dyn Store) -> RecoveryReport {
        if !self.config.read().recover_on_startup {
            tracing::info!("recovery on startup disabled");
            return RecoveryReport::default();
        }
        let report = self.recovery.recover(store);
        self.metrics
            .record_recovery(report.records_replayed, report.records_skipped);
        report
    }

    /// Diagnostics trigger: flushes the live store and re-runs recovery
    /// against it, reporting the outcome.
    pub fn reload(&self, store: &dyn Store) -> RecoveryReport {
        tracing::info!("reloading store from command log");
        store.flush();
        let report = self.recovery.recover(store);
        self.metrics
            .record_recovery(report.records_replayed, report.records_skipped);
        report
    }

    /// Cheap structural pre-check of the log, for diagnostics.
    #[must_use]
    pub fn validate_log(&self) -> LogValidation {
        self.recovery.validate_log()
    }

    /// Read-only snapshot for INFO-style reporting.
    #[must_use]
    pub fn stats(&self) -> DurabilityStats {
        DurabilityStats {
            enabled: self.writer.is_some(),
            last_sync_unix: self
                .writer
                .as_ref()
                .map(|w| w.last_sync_unix())
                .unwrap_or(0),
            log_path: self.writer.as_ref().map(|w| w.path().to_path_buf()),
            records_appended: self.metrics.records_appended(),
            bytes_appended: self.metrics.bytes_appended(),
            syncs: self.metrics.syncs(),
            compactions: self.metrics.compactions(),
            records_replayed: self.metrics.records_replayed(),
        }
    }

    /// Returns the current value of a configuration parameter.
    #[must_use]
    pub fn config_get(&self, key: &str) -> Option<String> {
        self.config.read().get_param(key)
    }

    /// Validates and applies a configuration parameter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DurabilityError::ConfigInvalid`] for unknown
    /// parameters or rejected values; the previous configuration is kept
    /// unchanged in that case.
    pub fn config_set(&self, key: &str, value: &str) -> DurabilityResult<()> {
        self.config.write().set_param(key, value)
    }

    /// Returns all configuration parameters as `(name, value)` pairs.
    #[must_use]
    pub fn config_params(&self) -> Vec<(String, String)> {
        self.config.read().params()
    }

    #[cfg(test)]
    pub(crate) fn writer_for_testing(&self) -> Option<&Arc<LogWriter>> {
        self.writer.as_ref()
    }
}
