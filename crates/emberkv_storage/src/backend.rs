//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level append-only storage backend for the command log.
///
/// Storage backends are **opaque byte sinks**. They provide simple
/// operations for appending and flushing data. The durability layer owns
/// all format interpretation - backends do not understand log lines,
/// timestamps, or commands.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - data is only ever added at the end, never rewritten in place
/// - `sync` ensures all appended data survives process termination
/// - Backends must be `Send` so a writer can be handed to background tasks
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send {
    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// This is a stronger guarantee than `flush` - after this returns
    /// successfully, all previously appended data is guaranteed to
    /// survive process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;
}
