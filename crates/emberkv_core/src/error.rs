//! Error types for the emberkv durability layer.

use std::io;
use thiserror::Error;

/// Result type for durability operations.
pub type DurabilityResult<T> = Result<T, DurabilityError>;

/// Errors that can occur in the durability layer.
///
/// Per-record corruption during replay is always local: it is reported
/// through [`crate::recovery::RecoveryReport`] rather than surfaced as an
/// error, so a single bad line can never abort recovery. The variants here
/// cover the operations that *can* fail for their caller.
#[derive(Debug, Error)]
pub enum DurabilityError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] emberkv_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Configuration failed validation.
    #[error("invalid configuration: {message}")]
    ConfigInvalid {
        /// Description of the violated constraint.
        message: String,
    },

    /// A required directory could not be created.
    #[error("filesystem failure: {message}")]
    Filesystem {
        /// Description of the failure.
        message: String,
    },

    /// Append attempted before `open` or after `stop`.
    #[error("log writer is not open")]
    NotOpen,

    /// A compaction is already in flight; the request was rejected.
    #[error("log compaction already in progress")]
    CompactionInProgress,

    /// A single log record could not be parsed or replayed.
    #[error("corrupt log record: {message}")]
    CorruptRecord {
        /// Description of the corruption.
        message: String,
    },
}

impl DurabilityError {
    /// Creates a configuration validation error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    /// Creates a filesystem failure error.
    pub fn filesystem(message: impl Into<String>) -> Self {
        Self::Filesystem {
            message: message.into(),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt_record(message: impl Into<String>) -> Self {
        Self::CorruptRecord {
            message: message.into(),
        }
    }
}
