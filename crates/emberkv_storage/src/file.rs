//! File-based storage backend for persistent storage.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A file-based append-only storage backend.
///
/// The file is opened in append mode, so every write lands at the end of
/// the file regardless of interleaving. An exclusive advisory lock is
/// taken on the file for the lifetime of the backend; a second process
/// opening the same log fails with [`StorageError::Locked`].
///
/// # Durability
///
/// - `flush()` pushes buffered data to the OS
/// - `sync()` calls `File::sync_all()` to ensure data and metadata are
///   on disk
///
/// # Example
///
/// ```no_run
/// use emberkv_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open_append(Path::new("appendonly.aof")).unwrap();
/// backend.append(b"1717171717 SET foo bar\n").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: File,
    size: u64,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path, in append mode.
    ///
    /// The containing directory must already exist. An exclusive advisory
    /// lock is acquired on the file; the lock is released when the backend
    /// is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or created (e.g. missing directory)
    /// - Another process holds the lock (returns [`StorageError::Locked`])
    pub fn open_append(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)?;

        if file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked {
                path: path.to_path_buf(),
            });
        }

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size,
        })
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Ok(self.size);
        }

        let offset = self.size;
        self.file.write_all(data)?;
        self.size += data.len() as u64;

        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_create_new() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let backend = FileBackend::open_append(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn file_open_fails_without_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("test.aof");

        let result = FileBackend::open_append(&path);
        assert!(matches!(result, Err(StorageError::Io(_))));
    }

    #[test]
    fn file_append_tracks_offsets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let mut backend = FileBackend::open_append(&path).unwrap();

        let offset1 = backend.append(b"hello").unwrap();
        assert_eq!(offset1, 0);

        let offset2 = backend.append(b" world").unwrap();
        assert_eq!(offset2, 5);

        assert_eq!(backend.size().unwrap(), 11);
    }

    #[test]
    fn file_reopen_continues_at_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        {
            let mut backend = FileBackend::open_append(&path).unwrap();
            backend.append(b"first\n").unwrap();
            backend.sync().unwrap();
        }

        let mut backend = FileBackend::open_append(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 6);

        backend.append(b"second\n").unwrap();
        backend.sync().unwrap();
        drop(backend);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn file_lock_refuses_second_writer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let _backend = FileBackend::open_append(&path).unwrap();

        let result = FileBackend::open_append(&path);
        assert!(matches!(result, Err(StorageError::Locked { .. })));
    }

    #[test]
    fn file_lock_released_on_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        {
            let _backend = FileBackend::open_append(&path).unwrap();
        }

        let _backend2 = FileBackend::open_append(&path).unwrap();
    }

    #[test]
    fn file_empty_append() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let mut backend = FileBackend::open_append(&path).unwrap();
        backend.append(b"x").unwrap();

        let offset = backend.append(b"").unwrap();
        assert_eq!(offset, 1);
        assert_eq!(backend.size().unwrap(), 1);
    }

    #[test]
    fn file_path_accessor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.aof");

        let backend = FileBackend::open_append(&path).unwrap();
        assert_eq!(backend.path(), path);
    }
}
