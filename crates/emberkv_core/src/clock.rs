//! Wall-clock helpers shared by the log writer, recovery, and the store.

use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current wall-clock time as unix seconds.
pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
