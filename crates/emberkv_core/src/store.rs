//! The store interface consumed by the durability layer.
//!
//! The in-memory key-value store itself lives outside this crate; recovery
//! and compaction only need the narrow mutation-and-snapshot surface
//! defined by [`Store`]. Replay goes through this trait directly - never
//! through a command dispatcher - so recovered commands are not re-logged.
//!
//! [`MemoryStore`] is a minimal reference implementation used by the test
//! suite and by embedders that do not bring their own store.

use crate::clock::unix_now;
use parking_lot::RwLock;
use std::collections::HashMap;

/// The mutation and snapshot surface the durability layer requires from a
/// key-value store.
///
/// Implementations must be safe to call from the worker threads executing
/// commands as well as from the background compaction task.
///
/// TTL conventions follow the store's public contract: `ttl` returns the
/// remaining seconds, `-1` when the key has no expiry, and `-2` when the
/// key does not exist.
pub trait Store: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Option<String>;

    /// Sets `key` to `value`, clearing any previous expiry.
    fn set(&self, key: &str, value: &str);

    /// Deletes the given keys, returning how many were present.
    fn delete(&self, keys: &[String]) -> usize;

    /// Sets an absolute expiry time (unix seconds) on a live key.
    ///
    /// Returns `false` if the key does not exist.
    fn expire(&self, key: &str, at_unix: i64) -> bool;

    /// Returns the remaining TTL of `key` in seconds, `-1` for no expiry,
    /// `-2` for a missing key.
    fn ttl(&self, key: &str) -> i64;

    /// Removes the expiry from a live key.
    ///
    /// Returns `true` if an expiry was present and removed.
    fn persist(&self, key: &str) -> bool;

    /// Removes every key.
    fn flush(&self);

    /// Returns all live keys.
    fn keys(&self) -> Vec<String>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<i64>,
}

impl Entry {
    fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// A minimal in-memory [`Store`] implementation.
///
/// Expired entries are treated as absent on read and purged lazily on
/// write. There is no pattern matching or eviction here - this is the
/// smallest store that recovery and compaction can be exercised against.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = unix_now();
        self.entries
            .read()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Returns `true` if the store holds no live keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = unix_now();
        let entries = self.entries.read();
        entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.write().insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
    }

    fn delete(&self, keys: &[String]) -> usize {
        let now = unix_now();
        let mut entries = self.entries.write();
        keys.iter()
            .filter(|key| {
                entries
                    .remove(*key)
                    .is_some_and(|e| !e.is_expired(now))
            })
            .count()
    }

    fn expire(&self, key: &str, at_unix: i64) -> bool {
        let now = unix_now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(at_unix);
                true
            }
            _ => false,
        }
    }

    fn ttl(&self, key: &str) -> i64 {
        let now = unix_now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match entry.expires_at {
                Some(at) => at - now,
                None => -1,
            },
            _ => -2,
        }
    }

    fn persist(&self, key: &str) -> bool {
        let now = unix_now();
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(entry) if !entry.is_expired(now) && entry.expires_at.is_some() => {
                entry.expires_at = None;
                true
            }
            _ => false,
        }
    }

    fn flush(&self) {
        self.entries.write().clear();
    }

    fn keys(&self) -> Vec<String> {
        let now = unix_now();
        self.entries
            .read()
            .iter()
            .filter(|(_, e)| !e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let store = MemoryStore::new();
        store.set("foo", "bar");
        assert_eq!(store.get("foo"), Some("bar".to_string()));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn set_overwrites_and_clears_expiry() {
        let store = MemoryStore::new();
        store.set("foo", "bar");
        store.expire("foo", unix_now() + 100);
        assert!(store.ttl("foo") > 0);

        store.set("foo", "baz");
        assert_eq!(store.ttl("foo"), -1);
        assert_eq!(store.get("foo"), Some("baz".to_string()));
    }

    #[test]
    fn delete_counts_live_keys() {
        let store = MemoryStore::new();
        store.set("a", "1");
        store.set("b", "2");

        let deleted = store.delete(&["a".into(), "b".into(), "c".into()]);
        assert_eq!(deleted, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn ttl_conventions() {
        let store = MemoryStore::new();
        assert_eq!(store.ttl("missing"), -2);

        store.set("foo", "bar");
        assert_eq!(store.ttl("foo"), -1);

        store.expire("foo", unix_now() + 50);
        let ttl = store.ttl("foo");
        assert!((49..=50).contains(&ttl), "ttl was {ttl}");
    }

    #[test]
    fn expire_on_missing_key_fails() {
        let store = MemoryStore::new();
        assert!(!store.expire("missing", unix_now() + 10));
    }

    #[test]
    fn expired_key_reads_as_absent() {
        let store = MemoryStore::new();
        store.set("foo", "bar");
        store.expire("foo", unix_now() - 1);

        assert_eq!(store.get("foo"), None);
        assert_eq!(store.ttl("foo"), -2);
        assert!(!store.keys().contains(&"foo".to_string()));
    }

    #[test]
    fn persist_removes_expiry() {
        let store = MemoryStore::new();
        store.set("foo", "bar");
        store.expire("foo", unix_now() + 100);

        assert!(store.persist("foo"));
        assert_eq!(store.ttl("foo"), -1);

        // No expiry left to remove
        assert!(!store.persist("foo"));
        assert!(!store.persist("missing"));
    }

    #[test]
    fn flush_empties_store() {
        let store = MemoryStore::new();
        store.set("a", "1");
        store.set("b", "2");
        store.flush();
        assert!(store.is_empty());
        assert!(store.keys().is_empty());
    }
}
