//! Crash recovery tests: truncated writes and corrupted logs.
//!
//! These tests damage a real log the way a crash or bit rot would and
//! verify the recovery policy: complete records before the damage are
//! kept, a single bad record is skipped, and a wholly unreadable log
//! degrades to an empty store without blocking startup.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Appends raw bytes to a log file, bypassing the writer.
///
/// # Panics
///
/// Panics if the file cannot be opened or written.
pub fn append_raw(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("open log for corruption");
    file.write_all(bytes).expect("write corruption");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::DurabilityHarness;
    use crate::integration::replay_log_into;
    use emberkv_core::{Store, SyncPolicy};

    fn harness_with_two_sets() -> (DurabilityHarness, std::path::PathBuf) {
        let harness = DurabilityHarness::new(SyncPolicy::Always);
        harness.apply("SET", &["first", "1"]);
        harness.apply("SET", &["second", "2"]);
        let path = harness.log_path();
        (harness, path)
    }

    #[test]
    fn truncated_timestamp_fragment_is_ignored() {
        let (harness, path) = harness_with_two_sets();
        harness.manager.stop().unwrap();

        // Crash mid-write: only part of the timestamp made it out
        append_raw(&path, b"17171");

        let (store, report) = replay_log_into(&path);
        assert_eq!(report.records_replayed, 2);
        assert_eq!(report.records_skipped, 0);
        assert!(!report.corrupted);
        assert_eq!(store.get("first"), Some("1".to_string()));
        assert_eq!(store.get("second"), Some("2".to_string()));
    }

    #[test]
    fn truncated_arguments_skip_one_record() {
        let (harness, path) = harness_with_two_sets();
        harness.manager.stop().unwrap();

        // Crash mid-write: the command name survived but the arguments
        // were cut short, leaving a SET with too few fields
        append_raw(&path, b"1717171717 SET orphan");

        let (store, report) = replay_log_into(&path);
        assert_eq!(report.records_replayed, 2);
        assert_eq!(report.records_skipped, 1);
        assert!(report.corrupted);
        assert!(!report.terminated_early);
        assert_eq!(store.get("orphan"), None);
    }

    #[test]
    fn bad_line_between_valid_records_skips_only_itself() {
        let harness = DurabilityHarness::new(SyncPolicy::Always);
        harness.apply("SET", &["before", "1"]);
        let path = harness.log_path();
        harness.manager.stop().unwrap();

        append_raw(&path, b"garbage SET x y\n");
        append_raw(&path, b"1717171717 SET after 2\n");

        let (store, report) = replay_log_into(&path);
        assert_eq!(report.records_replayed, 2);
        assert_eq!(report.records_skipped, 1);
        assert_eq!(store.get("before"), Some("1".to_string()));
        assert_eq!(store.get("after"), Some("2".to_string()));
    }

    #[test]
    fn undecodable_bytes_degrade_to_empty_store() {
        let (harness, path) = harness_with_two_sets();
        harness.manager.stop().unwrap();

        // Bit rot: a run of invalid UTF-8 makes the log unreadable
        append_raw(&path, &[0xff, 0xfe, 0xc0, 0x01, 0xff]);

        let (store, report) = replay_log_into(&path);
        assert!(report.corrupted);
        assert!(report.terminated_early);
        assert_eq!(report.records_replayed, 0);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn recovery_survives_a_crash_loop() {
        // Repeatedly crash-append garbage and re-recover; the valid prefix
        // must keep replaying identically every time
        let (harness, path) = harness_with_two_sets();
        harness.manager.stop().unwrap();

        for _ in 0..3 {
            append_raw(&path, b"not-a-timestamp FLUSHALL\n");
            let (store, report) = replay_log_into(&path);
            assert_eq!(report.records_replayed, 2);
            assert_eq!(store.get("first"), Some("1".to_string()));
        }
    }
}
