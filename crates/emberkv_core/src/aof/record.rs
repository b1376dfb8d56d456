//! Log record types and line serialization.

use crate::clock::unix_now;
use crate::error::{DurabilityError, DurabilityResult};
use std::fmt;

/// The closed set of store-mutating commands that are journaled.
///
/// This enum is the single source of truth for "is this command durable":
/// the manager classifies incoming command names against it once, at the
/// boundary, and replay matches on it. Commands outside this set are never
/// written to the log and are skipped on replay for forward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Set a key to a value.
    Set,
    /// Delete one or more keys.
    Del,
    /// Set a relative expiry (seconds from now) on a key.
    Expire,
    /// Set an absolute expiry (unix seconds) on a key.
    ExpireAt,
    /// Remove the expiry from a key.
    Persist,
    /// Remove every key.
    FlushAll,
}

impl CommandKind {
    /// Classifies a raw command name, case-insensitively.
    ///
    /// Returns `None` for any command outside the mutating set.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        const TABLE: [(&str, CommandKind); 6] = [
            ("SET", CommandKind::Set),
            ("DEL", CommandKind::Del),
            ("EXPIRE", CommandKind::Expire),
            ("EXPIREAT", CommandKind::ExpireAt),
            ("PERSIST", CommandKind::Persist),
            ("FLUSHALL", CommandKind::FlushAll),
        ];
        TABLE
            .iter()
            .find(|(n, _)| name.eq_ignore_ascii_case(n))
            .map(|(_, kind)| *kind)
    }

    /// Returns the canonical wire name of the command.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Set => "SET",
            Self::Del => "DEL",
            Self::Expire => "EXPIRE",
            Self::ExpireAt => "EXPIREAT",
            Self::Persist => "PERSIST",
            Self::FlushAll => "FLUSHALL",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single journaled command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Unix timestamp (seconds) at which the record was written.
    pub timestamp: i64,
    /// The mutating command.
    pub kind: CommandKind,
    /// Command arguments, in dispatch order.
    pub args: Vec<String>,
}

impl LogRecord {
    /// Creates a record with an explicit timestamp.
    #[must_use]
    pub fn new(timestamp: i64, kind: CommandKind, args: Vec<String>) -> Self {
        Self {
            timestamp,
            kind,
            args,
        }
    }

    /// Creates a record stamped with the current wall-clock time.
    #[must_use]
    pub fn now(kind: CommandKind, args: Vec<String>) -> Self {
        Self::new(unix_now(), kind, args)
    }

    /// Serializes the record as one log line, including the trailing
    /// newline.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut line = format!("{} {}", self.timestamp, self.kind);
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line.push('\n');
        line
    }

    /// Parses one log line.
    ///
    /// Returns `Ok(None)` for lines that replay skips without comment:
    /// blank lines, lines with fewer than two fields, and lines whose
    /// command is unrecognized (forward compatibility).
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::CorruptRecord`] when the timestamp field
    /// is not an integer.
    pub fn decode(line: &str) -> DurabilityResult<Option<Self>> {
        let mut fields = line.split_whitespace();
        let (Some(ts), Some(name)) = (fields.next(), fields.next()) else {
            return Ok(None);
        };

        let timestamp: i64 = ts.parse().map_err(|_| {
            DurabilityError::corrupt_record(format!("non-integer timestamp '{ts}'"))
        })?;

        let Some(kind) = CommandKind::from_name(name) else {
            tracing::debug!(command = name, "skipping unrecognized command during replay");
            return Ok(None);
        };

        let args = fields.map(str::to_string).collect();
        Ok(Some(Self {
            timestamp,
            kind,
            args,
        }))
    }
}
