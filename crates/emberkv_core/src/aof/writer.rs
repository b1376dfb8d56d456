//! Log writer: durable ordered appends and compaction.

use crate::aof::record::{CommandKind, LogRecord};
use crate::clock::unix_now;
use crate::config::SyncPolicy;
use crate::error::{DurabilityError, DurabilityResult};
use crate::stats::DurabilityMetrics;
use crate::store::Store;
use emberkv_storage::{FileBackend, StorageBackend};
use parking_lot::Mutex;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// State guarded by the writer lock.
///
/// `backend` is the generation indirection for the compaction swap:
/// appends dereference it under the lock, and compaction retargets it to a
/// fresh handle in a single assignment once the atomic rename is done.
struct WriterInner {
    backend: Option<Box<dyn StorageBackend>>,
    pending_unsynced: u64,
    last_sync: Instant,
    last_sync_unix: i64,
    /// Armed for the duration of a compaction: appends are mirrored here
    /// and drained into the new log before the swap, so nothing issued
    /// mid-compaction is lost across it.
    rewrite_buffer: Option<Vec<u8>>,
}

/// Owns the append-only log file handle.
///
/// All appends and syncs serialize through the single writer lock, so
/// concurrent callers can never interleave partial lines. The handle is
/// never shared: recovery reads through its own short-lived handle.
///
/// # Lifecycle
///
/// `open` acquires the file for append; `close` flushes, fsyncs, and
/// releases it (idempotent). `shutdown` additionally latches a terminal
/// stopped state - once stopped the writer refuses to reopen, including
/// from a compaction that completes afterwards.
pub struct LogWriter {
    path: PathBuf,
    temp_dir: PathBuf,
    sync_policy: SyncPolicy,
    inner: Mutex<WriterInner>,
    compacting: AtomicBool,
    stopped: AtomicBool,
    metrics: Arc<DurabilityMetrics>,
}

/// Result of a completed compaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Live keys snapshotted into the new log.
    pub live_keys: u64,
    /// Records written (a key with a TTL produces two).
    pub records_written: u64,
    /// Size of the new log in bytes, including drained concurrent appends.
    pub bytes_written: u64,
}

/// Exclusive right to run one compaction pass.
///
/// While a permit is alive every other acquisition attempt is rejected,
/// never queued. Dropping the permit - with or without running it -
/// releases the in-flight flag.
pub struct CompactionPermit {
    writer: Arc<LogWriter>,
}

impl CompactionPermit {
    /// Attempts to acquire the single compaction slot for `writer`.
    ///
    /// Returns `None` when a compaction is already in flight.
    #[must_use]
    pub fn acquire(writer: &Arc<LogWriter>) -> Option<Self> {
        writer
            .compacting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self {
                writer: Arc::clone(writer),
            })
    }

    /// Runs the compaction pass this permit was issued for.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written or the swap
    /// fails; the original log is left untouched in that case.
    pub fn run(self, store: &dyn Store) -> DurabilityResult<CompactionStats> {
        self.writer.run_and_record(store)
    }
}

impl Drop for CompactionPermit {
    fn drop(&mut self) {
        self.writer.compacting.store(false, Ordering::SeqCst);
    }
}

/// Clears the in-flight flag when an inline compaction unwinds.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl LogWriter {
    /// Creates a writer for the log at `path`.
    ///
    /// The writer starts closed; call [`LogWriter::open`] before appending.
    /// Compaction rewrite files are created under `temp_dir`.
    #[must_use]
    pub fn new(
        path: PathBuf,
        temp_dir: PathBuf,
        sync_policy: SyncPolicy,
        metrics: Arc<DurabilityMetrics>,
    ) -> Self {
        Self {
            path,
            temp_dir,
            sync_policy,
            inner: Mutex::new(WriterInner {
                backend: None,
                pending_unsynced: 0,
                last_sync: Instant::now(),
                last_sync_unix: 0,
                rewrite_buffer: None,
            }),
            compacting: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            metrics,
        }
    }

    /// Acquires the log file for append.
    ///
    /// Calling `open` on an already-open writer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::NotOpen`] if the writer was stopped, or
    /// a storage error if the containing directory is missing, unwritable,
    /// or the file is locked by another process.
    pub fn open(&self) -> DurabilityResult<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(DurabilityError::NotOpen);
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.backend.is_some() {
            return Ok(());
        }
        inner.backend = Some(Box::new(FileBackend::open_append(&self.path)?));
        tracing::debug!(path = %self.path.display(), "append-only log opened");
        Ok(())
    }

    /// Appends a record to the log.
    ///
    /// Under [`SyncPolicy::Always`] the record is flushed and fsynced
    /// before this returns and the pending counter resets to 0; under the
    /// other policies the write stays buffered for a later sync.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::NotOpen`] before `open` or after
    /// `shutdown`, or the underlying storage error on write failure.
    pub fn append(&self, record: &LogRecord) -> DurabilityResult<()> {
        let line = record.encode();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let backend = inner.backend.as_mut().ok_or(DurabilityError::NotOpen)?;

        backend.append(line.as_bytes())?;
        if let Some(buffer) = inner.rewrite_buffer.as_mut() {
            buffer.extend_from_slice(line.as_bytes());
        }
        inner.pending_unsynced += 1;
        self.metrics.record_append(line.len() as u64);

        if self.sync_policy == SyncPolicy::Always {
            sync_inner(inner)?;
            self.metrics.record_sync();
        }
        Ok(())
    }

    /// Syncs pending writes if the policy calls for it.
    ///
    /// Under [`SyncPolicy::EverySecond`], flushes and fsyncs when at least
    /// one second has elapsed since the last sync and writes are pending.
    /// A no-op under `Always` (appends already sync) and `Never`.
    ///
    /// Returns whether a sync occurred.
    ///
    /// # Errors
    ///
    /// Returns the underlying storage error if the sync fails.
    pub fn maybe_sync(&self) -> DurabilityResult<bool> {
        if self.sync_policy != SyncPolicy::EverySecond {
            return Ok(false);
        }
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.backend.is_none() || inner.pending_unsynced == 0 {
            return Ok(false);
        }
        if inner.last_sync.elapsed() < Duration::from_secs(1) {
            return Ok(false);
        }
        sync_inner(inner)?;
        self.metrics.record_sync();
        Ok(true)
    }

    /// Forces pending writes to stable storage, regardless of policy.
    ///
    /// # Errors
    ///
    /// Returns the underlying storage error if the sync fails.
    pub fn sync(&self) -> DurabilityResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.backend.is_none() || inner.pending_unsynced == 0 {
            return Ok(());
        }
        sync_inner(inner)?;
        self.metrics.record_sync();
        Ok(())
    }

    /// Flushes, fsyncs, and releases the file handle.
    ///
    /// Safe to call when already closed. The handle is released even when
    /// the final sync fails.
    ///
    /// # Errors
    ///
    /// Returns the underlying storage error if the final flush or fsync
    /// failed.
    pub fn close(&self) -> DurabilityResult<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(mut backend) = inner.backend.take() else {
            return Ok(());
        };
        let result = backend.flush().and_then(|()| backend.sync());
        inner.pending_unsynced = 0;
        inner.last_sync = Instant::now();
        inner.last_sync_unix = unix_now();
        drop(backend);
        result?;
        tracing::debug!(path = %self.path.display(), "append-only log closed");
        Ok(())
    }

    /// Closes the writer and latches the terminal stopped state.
    ///
    /// After this returns no append will succeed and nothing - including a
    /// compaction completing later - reopens the handle.
    ///
    /// # Errors
    ///
    /// Returns the underlying storage error if the final sync failed; the
    /// stopped state is latched regardless.
    pub fn shutdown(&self) -> DurabilityResult<()> {
        self.stopped.store(true, Ordering::SeqCst);
        self.close()
    }

    /// Rewrites the log to its minimal snapshot form.
    ///
    /// For every live key in `store` a `SET` record is written, followed
    /// by an `EXPIRE` record when the key has a positive remaining TTL
    /// (re-expressed relative to compaction time). The new log is built in
    /// a temporary file under the configured temp directory and replaces
    /// the original only via atomic rename once fully written and fsynced;
    /// on failure the temporary file is removed and the original log is
    /// untouched. An open handle is retargeted to the new file after the
    /// swap.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::CompactionInProgress`] if another
    /// compaction is in flight, or the underlying I/O error on failure.
    pub fn compact(&self, store: &dyn Store) -> DurabilityResult<CompactionStats> {
        if self
            .compacting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DurabilityError::CompactionInProgress);
        }
        let _guard = InFlightGuard(&self.compacting);
        self.run_and_record(store)
    }

    /// Returns whether a compaction is currently in flight.
    #[must_use]
    pub fn compaction_in_flight(&self) -> bool {
        self.compacting.load(Ordering::SeqCst)
    }

    /// Returns whether the log has grown enough to be worth compacting.
    ///
    /// True iff the current size is at least `min_size` and exceeds
    /// `min_size * growth_factor`.
    #[must_use]
    pub fn needs_compaction(&self, min_size: u64, growth_factor: u64) -> bool {
        let size = self.size();
        size >= min_size && size > min_size.saturating_mul(growth_factor)
    }

    /// Returns the current log size in bytes.
    ///
    /// Prefers the live handle's tracked size, falling back to filesystem
    /// metadata when the writer is closed; 0 when the file does not exist.
    #[must_use]
    pub fn size(&self) -> u64 {
        {
            let inner = self.inner.lock();
            if let Some(backend) = inner.backend.as_ref() {
                if let Ok(size) = backend.size() {
                    return size;
                }
            }
        }
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Returns the number of appends not yet covered by an fsync.
    #[must_use]
    pub fn pending_unsynced(&self) -> u64 {
        self.inner.lock().pending_unsynced
    }

    /// Unix timestamp of the last completed sync, 0 if none yet.
    #[must_use]
    pub fn last_sync_unix(&self) -> i64 {
        self.inner.lock().last_sync_unix
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn run_and_record(&self, store: &dyn Store) -> DurabilityResult<CompactionStats> {
        let result = self.run_compaction(store);
        match &result {
            Ok(_) => self.metrics.record_compaction(),
            Err(_) => self.metrics.record_compaction_failure(),
        }
        result
    }

    fn run_compaction(&self, store: &dyn Store) -> DurabilityResult<CompactionStats> {
        // Arm the rewrite buffer so appends issued while the snapshot is
        // being written survive the swap.
        self.inner.lock().rewrite_buffer = Some(Vec::new());

        let started_at = unix_now();
        let temp_path = self.temp_dir.join(format!("temp-rewrite-{started_at}.log"));

        let mut stats = match write_snapshot(&temp_path, store, started_at) {
            Ok(stats) => stats,
            Err(e) => {
                let _ = fs::remove_file(&temp_path);
                self.inner.lock().rewrite_buffer = None;
                return Err(e);
            }
        };

        // Swap under the writer lock: drain concurrent appends into the
        // new log, rename it over the old one, retarget the handle.
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if let Err(e) = finish_swap(&temp_path, &self.path, inner, &mut stats) {
            let _ = fs::remove_file(&temp_path);
            inner.rewrite_buffer = None;
            return Err(e);
        }

        let had_handle = inner.backend.take().is_some();
        if had_handle {
            if self.stopped.load(Ordering::SeqCst) {
                tracing::debug!("writer stopped during compaction; leaving log handle closed");
            } else {
                inner.backend = Some(Box::new(FileBackend::open_append(&self.path)?));
            }
        }
        inner.pending_unsynced = 0;
        inner.last_sync = Instant::now();
        inner.last_sync_unix = unix_now();

        tracing::info!(
            live_keys = stats.live_keys,
            bytes = stats.bytes_written,
            "log compaction complete"
        );
        Ok(stats)
    }

    #[cfg(test)]
    pub(crate) fn rewind_last_sync(&self, secs: u64) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.last_sync = Instant::now()
            .checked_sub(Duration::from_secs(secs))
            .unwrap_or_else(Instant::now);
    }
}

impl fmt::Debug for LogWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogWriter")
            .field("path", &self.path)
            .field("sync_policy", &self.sync_policy)
            .field("compacting", &self.compacting)
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

fn sync_inner(inner: &mut WriterInner) -> DurabilityResult<()> {
    if let Some(backend) = inner.backend.as_mut() {
        backend.flush()?;
        backend.sync()?;
    }
    inner.pending_unsynced = 0;
    inner.last_sync = Instant::now();
    inner.last_sync_unix = unix_now();
    Ok(())
}

fn write_snapshot(
    temp_path: &Path,
    store: &dyn Store,
    timestamp: i64,
) -> DurabilityResult<CompactionStats> {
    let file = File::create(temp_path)?;
    let mut writer = BufWriter::new(file);
    let mut stats = CompactionStats::default();

    for key in store.keys() {
        // The key may expire or be deleted between keys() and get().
        let Some(value) = store.get(&key) else { continue };

        let set = LogRecord::new(timestamp, CommandKind::Set, vec![key.clone(), value]);
        writer.write_all(set.encode().as_bytes())?;
        stats.records_written += 1;

        // Remaining TTL re-expressed relative to compaction time, so the
        // record replays without reference to the old clock.
        let ttl = store.ttl(&key);
        if ttl > 0 {
            let expire = LogRecord::new(
                timestamp,
                CommandKind::Expire,
                vec![key.clone(), ttl.to_string()],
            );
            writer.write_all(expire.encode().as_bytes())?;
            stats.records_written += 1;
        }
        stats.live_keys += 1;
    }

    writer.flush()?;
    writer.get_ref().sync_all()?;
    stats.bytes_written = writer.get_ref().metadata()?.len();
    Ok(stats)
}

fn finish_swap(
    temp_path: &Path,
    log_path: &Path,
    inner: &mut WriterInner,
    stats: &mut CompactionStats,
) -> DurabilityResult<()> {
    let buffered = inner.rewrite_buffer.take().unwrap_or_default();
    if !buffered.is_empty() {
        let mut file = OpenOptions::new().append(true).open(temp_path)?;
        file.write_all(&buffered)?;
        file.sync_all()?;
        stats.bytes_written += buffered.len() as u64;
    }

    fs::rename(temp_path, log_path)?;
    sync_parent_dir(log_path)?;
    Ok(())
}

/// Fsyncs the directory containing `path` so the rename is durable.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> DurabilityResult<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> DurabilityResult<()> {
    // NTFS journaling covers metadata durability for renames.
    Ok(())
}
