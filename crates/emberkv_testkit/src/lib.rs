//! # emberkv Testkit
//!
//! Test utilities for the emberkv durability layer.
//!
//! This crate provides:
//! - Test fixtures simulating the command dispatch path
//! - Property-based test generators using proptest
//! - Cross-crate integration tests for log round-trips and compaction
//! - Crash recovery tests for truncated and corrupted logs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use emberkv_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_harness() {
//!     let harness = DurabilityHarness::new(SyncPolicy::Always);
//!     harness.apply("SET", &["foo", "bar"]);
//!     let harness = harness.restart();
//!     assert_eq!(harness.store.get("foo"), Some("bar".to_string()));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
