//! Property-based test generators using proptest.
//!
//! Keys and values are generated without embedded spaces: the log's
//! space-delimited line format documents spaced arguments as ambiguous,
//! so round-trip properties stay within the format's guarantees.

use proptest::prelude::*;

/// A mutating operation against the store, as the dispatcher would issue it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Set a key to a value.
    Set {
        /// Key to set.
        key: String,
        /// Value to store.
        value: String,
    },
    /// Delete a key.
    Del {
        /// Key to delete.
        key: String,
    },
    /// Set a relative expiry on a key.
    Expire {
        /// Key to expire.
        key: String,
        /// Seconds from now; generated far enough out that keys do not
        /// expire while a test is running.
        seconds: i64,
    },
    /// Remove the expiry from a key.
    Persist {
        /// Key to persist.
        key: String,
    },
    /// Remove every key.
    FlushAll,
}

impl Op {
    /// Returns the command name and arguments for dispatch.
    #[must_use]
    pub fn command(&self) -> (&'static str, Vec<String>) {
        match self {
            Self::Set { key, value } => ("SET", vec![key.clone(), value.clone()]),
            Self::Del { key } => ("DEL", vec![key.clone()]),
            Self::Expire { key, seconds } => {
                ("EXPIRE", vec![key.clone(), seconds.to_string()])
            }
            Self::Persist { key } => ("PERSIST", vec![key.clone()]),
            Self::FlushAll => ("FLUSHALL", vec![]),
        }
    }
}

/// Strategy for store keys: short, space-free, drawn from a small
/// alphabet so operations collide on keys often.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-d][a-z0-9]{0,5}").expect("valid regex")
}

/// Strategy for values: non-empty and space-free.
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9_-]{1,12}").expect("valid regex")
}

/// Strategy for a single operation, weighted towards writes.
pub fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| Op::Set { key, value }),
        2 => key_strategy().prop_map(|key| Op::Del { key }),
        2 => (key_strategy(), 100i64..100_000)
            .prop_map(|(key, seconds)| Op::Expire { key, seconds }),
        1 => key_strategy().prop_map(|key| Op::Persist { key }),
        1 => Just(Op::FlushAll),
    ]
}

/// Strategy for a sequence of operations.
pub fn ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 0..max_len)
}
