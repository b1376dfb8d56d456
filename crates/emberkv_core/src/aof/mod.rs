//! Append-only command log (AOF).
//!
//! Every mutating command is journaled to a textual append-only log before
//! the server acknowledges it (subject to the configured sync policy). On
//! startup the log is replayed to reconstruct store state; a background
//! compaction pass periodically rewrites the log to its minimal snapshot
//! form so it cannot grow without bound.
//!
//! ## Record Format
//!
//! One UTF-8 line per record:
//!
//! ```text
//! <unixTimestampSeconds> <COMMAND> <arg0> <arg1> ...\n
//! ```
//!
//! Fields are space-separated with no quoting or escaping. An argument
//! containing a space is ambiguous on replay; the final argument group is
//! re-joined with single spaces. This is a documented limitation of the
//! format, not something the codec repairs.
//!
//! ## Invariants
//!
//! - The log is **append-only**; records are never modified after write
//! - Appends are serialized under a single writer lock - concurrent
//!   callers can never interleave partial lines
//! - `pending_unsynced` resets to 0 exactly when an fsync completes
//! - Compaction replaces the log only via atomic rename of a fully
//!   written, fsynced temporary file; on failure the original log is
//!   untouched
//! - At most one compaction is in flight; a second request is rejected,
//!   never queued

mod record;
mod writer;

pub use record::{CommandKind, LogRecord};
pub use writer::{CompactionPermit, CompactionStats, LogWriter};
