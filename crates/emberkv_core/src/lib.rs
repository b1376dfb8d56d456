//! # emberkv Core
//!
//! Durability layer for the emberkv key-value store.
//!
//! This crate provides:
//! - An append-only command log (AOF) recording every mutating command
//! - Sync policies trading latency for durability (`always`, `everysec`, `no`)
//! - Background log compaction bounding log growth
//! - Crash recovery that replays the log into the store at startup,
//!   tolerating truncated or corrupted records
//!
//! ## Architecture
//!
//! - [`DurabilityConfig`] - validated settings: log location, sync policy,
//!   compaction thresholds
//! - [`LogWriter`] - owns the log file handle; appends, syncs, compacts
//! - [`RecoveryEngine`] - replays an existing log into a [`Store`]
//! - [`DurabilityManager`] - orchestrates the above and is the single
//!   integration point for the command layer
//!
//! ## Example
//!
//! ```no_run
//! use emberkv_core::{DurabilityConfig, DurabilityManager, MemoryStore, Store};
//!
//! # fn main() -> Result<(), emberkv_core::DurabilityError> {
//! let manager = DurabilityManager::new(DurabilityConfig::default())?;
//! let store = MemoryStore::new();
//!
//! // Recovery first, then open the writer
//! let report = manager.recover_on_startup(&store);
//! println!("replayed {} records", report.records_replayed);
//! manager.start()?;
//!
//! // The dispatcher forwards every command; the manager filters
//! store.set("greeting", "hello");
//! manager.record_if_mutating("SET", &["greeting".into(), "hello".into()])?;
//!
//! manager.stop()?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aof;
mod clock;
pub mod config;
pub mod error;
pub mod manager;
pub mod recovery;
pub mod stats;
pub mod store;

pub use aof::{CommandKind, CompactionPermit, CompactionStats, LogRecord, LogWriter};
pub use config::{DurabilityConfig, SyncPolicy};
pub use error::{DurabilityError, DurabilityResult};
pub use manager::DurabilityManager;
pub use recovery::{LogValidation, RecoveryEngine, RecoveryReport};
pub use stats::{DurabilityMetrics, DurabilityStats};
pub use store::{MemoryStore, Store};
