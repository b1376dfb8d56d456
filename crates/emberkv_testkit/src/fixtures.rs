//! Test fixtures and harness helpers.

use emberkv_core::{DurabilityConfig, DurabilityManager, MemoryStore, Store, SyncPolicy};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::TempDir;

/// Returns the current wall-clock time as unix seconds.
#[must_use]
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A durability manager wired to a temporary directory and an in-memory
/// store, simulating the command dispatch path.
///
/// The harness applies each command to the store first and then records
/// it, the same ordering the dispatcher uses, so compaction snapshots
/// observe applied effects.
pub struct DurabilityHarness {
    /// The manager under test.
    pub manager: DurabilityManager,
    /// The store commands are applied to.
    pub store: Arc<MemoryStore>,
    config: DurabilityConfig,
    _dir: Arc<TempDir>,
}

impl DurabilityHarness {
    /// Creates a started harness with an empty store and log.
    ///
    /// # Panics
    ///
    /// Panics if the manager cannot be constructed or started.
    #[must_use]
    pub fn new(policy: SyncPolicy) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let config = DurabilityConfig::new()
            .data_dir(dir.path().join("data"))
            .temp_dir(dir.path().join("data/temp"))
            .sync_policy(policy);
        Self::start_with(config, Arc::new(dir))
    }

    fn start_with(config: DurabilityConfig, dir: Arc<TempDir>) -> Self {
        let manager = DurabilityManager::new(config.clone()).expect("create manager");
        let store = Arc::new(MemoryStore::new());
        manager.recover_on_startup(store.as_ref());
        manager.start().expect("start manager");
        Self {
            manager,
            store,
            config,
            _dir: dir,
        }
    }

    /// Applies a command to the store and records it, like the dispatcher.
    ///
    /// # Panics
    ///
    /// Panics if recording fails.
    pub fn apply(&self, command: &str, args: &[&str]) {
        apply_to_store(self.store.as_ref(), command, args);
        let owned: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.manager
            .record_if_mutating(command, &owned)
            .expect("record command");
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.config.log_path()
    }

    /// Stops the manager and returns a fresh one recovered from the same
    /// log, with a new empty store - a simulated process restart.
    ///
    /// # Panics
    ///
    /// Panics if stopping or restarting fails.
    #[must_use]
    pub fn restart(self) -> Self {
        self.manager.stop().expect("stop manager");
        Self::start_with(self.config.clone(), Arc::clone(&self._dir))
    }
}

/// Applies a command to the store the way the dispatcher would.
///
/// Unknown commands and wrong arities are ignored, mirroring a dispatcher
/// that validated the command before execution.
pub fn apply_to_store(store: &dyn Store, command: &str, args: &[&str]) {
    match command.to_ascii_uppercase().as_str() {
        "SET" if args.len() >= 2 => store.set(args[0], &args[1..].join(" ")),
        "DEL" if !args.is_empty() => {
            let keys: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            store.delete(&keys);
        }
        "EXPIRE" if args.len() == 2 => {
            if let Ok(seconds) = args[1].parse::<i64>() {
                store.expire(args[0], unix_now() + seconds);
            }
        }
        "EXPIREAT" if args.len() == 2 => {
            if let Ok(at) = args[1].parse::<i64>() {
                store.expire(args[0], at);
            }
        }
        "PERSIST" if args.len() == 1 => {
            store.persist(args[0]);
        }
        "FLUSHALL" => store.flush(),
        _ => {}
    }
}

/// Observable store state: key -> (value, has expiry).
///
/// This is the equality domain for round-trip and compaction tests; exact
/// TTL values shift with the clock, so only expiry presence is compared.
#[must_use]
pub fn observable_state(store: &dyn Store) -> BTreeMap<String, (String, bool)> {
    let mut state = BTreeMap::new();
    for key in store.keys() {
        let Some(value) = store.get(&key) else { continue };
        let has_expiry = store.ttl(&key) >= 0;
        state.insert(key, (value, has_expiry));
    }
    state
}
