//! Durability configuration.

use crate::error::{DurabilityError, DurabilityResult};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

/// Policy governing when buffered log writes are forced to stable storage.
///
/// The wire vocabulary is parsed case-insensitively at the boundary only;
/// internally the policy is always one of these three values. Unrecognized
/// values fail with [`DurabilityError::ConfigInvalid`], never silently
/// defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Flush and fsync synchronously on every append.
    Always,
    /// Fsync at most once per second, driven by periodic maintenance.
    #[default]
    EverySecond,
    /// Never fsync explicitly; leave write-back to the OS.
    Never,
}

impl SyncPolicy {
    /// Returns the canonical wire name for this policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::EverySecond => "everysec",
            Self::Never => "no",
        }
    }
}

impl FromStr for SyncPolicy {
    type Err = DurabilityError;

    fn from_str(s: &str) -> DurabilityResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "everysec" | "everysecond" => Ok(Self::EverySecond),
            "no" | "never" => Ok(Self::Never),
            other => Err(DurabilityError::config_invalid(format!(
                "invalid sync policy '{other}': must be one of always, everysec, no"
            ))),
        }
    }
}

impl fmt::Display for SyncPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated settings for the durability layer.
///
/// Constructed once at startup and mutable at runtime through
/// [`DurabilityConfig::set_param`]; every mutation re-runs validation and a
/// failed validation leaves the prior configuration unchanged.
///
/// Path changes (`data_dir`, `temp_dir`, `log_filename`) take effect the
/// next time a [`crate::manager::DurabilityManager`] is constructed; a live
/// log writer keeps the path it was opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurabilityConfig {
    /// File name of the append-only log, placed under `data_dir`.
    pub log_filename: String,

    /// When buffered log writes are forced to disk.
    pub sync_policy: SyncPolicy,

    /// Log size below which compaction is never triggered.
    pub compaction_min_size: u64,

    /// Growth multiplier over `compaction_min_size` that makes the log
    /// eligible for compaction.
    pub compaction_growth_factor: u64,

    /// Directory holding the live log file.
    pub data_dir: PathBuf,

    /// Directory holding in-progress compaction rewrite files.
    pub temp_dir: PathBuf,

    /// Master switch: when false, no log writer is created and
    /// `record_if_mutating` is a no-op.
    pub persistence_enabled: bool,

    /// Whether startup recovery replays an existing log into the store.
    pub recover_on_startup: bool,

    /// Advisory memory ceiling for the store, surfaced through the
    /// configuration interface; not enforced by the durability layer.
    pub max_memory: u64,
}

impl Default for DurabilityConfig {
    fn default() -> Self {
        Self {
            log_filename: "appendonly.aof".to_string(),
            sync_policy: SyncPolicy::EverySecond,
            compaction_min_size: 1024 * 1024,       // 1 MiB
            compaction_growth_factor: 2,
            data_dir: PathBuf::from("./data"),
            temp_dir: PathBuf::from("./data/temp"),
            persistence_enabled: true,
            recover_on_startup: true,
            max_memory: 100 * 1024 * 1024, // 100 MiB
        }
    }
}

impl DurabilityConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log file name.
    #[must_use]
    pub fn log_filename(mut self, name: impl Into<String>) -> Self {
        self.log_filename = name.into();
        self
    }

    /// Sets the sync policy.
    #[must_use]
    pub const fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Sets the minimum log size for compaction eligibility.
    #[must_use]
    pub const fn compaction_min_size(mut self, size: u64) -> Self {
        self.compaction_min_size = size;
        self
    }

    /// Sets the compaction growth factor.
    #[must_use]
    pub const fn compaction_growth_factor(mut self, factor: u64) -> Self {
        self.compaction_growth_factor = factor;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Sets the temporary directory used by compaction.
    #[must_use]
    pub fn temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Sets whether persistence is enabled.
    #[must_use]
    pub const fn persistence_enabled(mut self, value: bool) -> Self {
        self.persistence_enabled = value;
        self
    }

    /// Sets whether recovery runs on startup.
    #[must_use]
    pub const fn recover_on_startup(mut self, value: bool) -> Self {
        self.recover_on_startup = value;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::ConfigInvalid`] if the log file name is
    /// empty, a directory is empty, or the growth factor is zero.
    pub fn validate(&self) -> DurabilityResult<()> {
        if self.log_filename.trim().is_empty() {
            return Err(DurabilityError::config_invalid(
                "log file name cannot be empty",
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(DurabilityError::config_invalid(
                "data directory cannot be empty",
            ));
        }
        if self.temp_dir.as_os_str().is_empty() {
            return Err(DurabilityError::config_invalid(
                "temp directory cannot be empty",
            ));
        }
        if self.compaction_growth_factor == 0 {
            return Err(DurabilityError::config_invalid(
                "compaction growth factor must be at least 1",
            ));
        }
        Ok(())
    }

    /// Returns the full path of the append-only log file.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_filename)
    }

    /// Creates the data and temp directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::Filesystem`] if either directory cannot
    /// be created.
    pub fn ensure_directories(&self) -> DurabilityResult<()> {
        for dir in [&self.data_dir, &self.temp_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                DurabilityError::filesystem(format!(
                    "failed to create directory {}: {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Returns the current value of a named parameter, or `None` for an
    /// unknown name.
    #[must_use]
    pub fn get_param(&self, key: &str) -> Option<String> {
        match key {
            "log_filename" => Some(self.log_filename.clone()),
            "sync_policy" => Some(self.sync_policy.to_string()),
            "compaction_min_size" => Some(self.compaction_min_size.to_string()),
            "compaction_growth_factor" => Some(self.compaction_growth_factor.to_string()),
            "data_dir" => Some(self.data_dir.display().to_string()),
            "temp_dir" => Some(self.temp_dir.display().to_string()),
            "persistence_enabled" => Some(self.persistence_enabled.to_string()),
            "recover_on_startup" => Some(self.recover_on_startup.to_string()),
            "max_memory" => Some(self.max_memory.to_string()),
            _ => None,
        }
    }

    /// Sets a named parameter from its string representation.
    ///
    /// The update is applied to a candidate copy and committed only after
    /// the whole configuration re-validates, so a rejected value leaves the
    /// configuration exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`DurabilityError::ConfigInvalid`] for an unknown parameter
    /// name, an unparseable value, or a value that fails validation.
    pub fn set_param(&mut self, key: &str, value: &str) -> DurabilityResult<()> {
        let mut candidate = self.clone();
        match key {
            "log_filename" => candidate.log_filename = value.to_string(),
            "sync_policy" => candidate.sync_policy = value.parse()?,
            "compaction_min_size" => candidate.compaction_min_size = parse_u64(key, value)?,
            "compaction_growth_factor" => {
                candidate.compaction_growth_factor = parse_u64(key, value)?;
            }
            "data_dir" => candidate.data_dir = PathBuf::from(value),
            "temp_dir" => candidate.temp_dir = PathBuf::from(value),
            "persistence_enabled" => candidate.persistence_enabled = parse_bool(key, value)?,
            "recover_on_startup" => candidate.recover_on_startup = parse_bool(key, value)?,
            "max_memory" => candidate.max_memory = parse_u64(key, value)?,
            other => {
                return Err(DurabilityError::config_invalid(format!(
                    "unknown parameter '{other}'"
                )));
            }
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Returns all parameters as `(name, value)` pairs, for INFO-style
    /// reporting.
    #[must_use]
    pub fn params(&self) -> Vec<(String, String)> {
        const KEYS: [&str; 9] = [
            "log_filename",
            "sync_policy",
            "compaction_min_size",
            "compaction_growth_factor",
            "data_dir",
            "temp_dir",
            "persistence_enabled",
            "recover_on_startup",
            "max_memory",
        ];
        KEYS.iter()
            .map(|k| ((*k).to_string(), self.get_param(k).unwrap_or_default()))
            .collect()
    }
}

fn parse_u64(key: &str, value: &str) -> DurabilityResult<u64> {
    value.parse().map_err(|_| {
        DurabilityError::config_invalid(format!("parameter '{key}' expects an integer, got '{value}'"))
    })
}

fn parse_bool(key: &str, value: &str) -> DurabilityResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(DurabilityError::config_invalid(format!(
            "parameter '{key}' expects a boolean, got '{value}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = DurabilityConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.persistence_enabled);
        assert!(config.recover_on_startup);
        assert_eq!(config.sync_policy, SyncPolicy::EverySecond);
    }

    #[test]
    fn builder_pattern() {
        let config = DurabilityConfig::new()
            .sync_policy(SyncPolicy::Always)
            .persistence_enabled(false)
            .compaction_min_size(1024);

        assert_eq!(config.sync_policy, SyncPolicy::Always);
        assert!(!config.persistence_enabled);
        assert_eq!(config.compaction_min_size, 1024);
    }

    #[test]
    fn empty_log_filename_fails_validation() {
        let config = DurabilityConfig::new().log_filename("");
        assert!(matches!(
            config.validate(),
            Err(DurabilityError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn zero_growth_factor_fails_validation() {
        let config = DurabilityConfig::new().compaction_growth_factor(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn sync_policy_parses_case_insensitively() {
        assert_eq!("ALWAYS".parse::<SyncPolicy>().unwrap(), SyncPolicy::Always);
        assert_eq!(
            "everysec".parse::<SyncPolicy>().unwrap(),
            SyncPolicy::EverySecond
        );
        assert_eq!(
            "EverySecond".parse::<SyncPolicy>().unwrap(),
            SyncPolicy::EverySecond
        );
        assert_eq!("No".parse::<SyncPolicy>().unwrap(), SyncPolicy::Never);
        assert_eq!("never".parse::<SyncPolicy>().unwrap(), SyncPolicy::Never);
    }

    #[test]
    fn sync_policy_rejects_unknown_values() {
        assert!("sometimes".parse::<SyncPolicy>().is_err());
        assert!("".parse::<SyncPolicy>().is_err());
    }

    #[test]
    fn log_path_joins_data_dir() {
        let config = DurabilityConfig::new()
            .data_dir("/var/lib/emberkv")
            .log_filename("commands.aof");
        assert_eq!(
            config.log_path(),
            PathBuf::from("/var/lib/emberkv/commands.aof")
        );
    }

    #[test]
    fn set_param_updates_value() {
        let mut config = DurabilityConfig::default();
        config.set_param("sync_policy", "always").unwrap();
        assert_eq!(config.sync_policy, SyncPolicy::Always);

        config.set_param("compaction_min_size", "2048").unwrap();
        assert_eq!(config.compaction_min_size, 2048);
    }

    #[test]
    fn set_param_rejects_unknown_key() {
        let mut config = DurabilityConfig::default();
        let result = config.set_param("no_such_param", "1");
        assert!(matches!(result, Err(DurabilityError::ConfigInvalid { .. })));
    }

    #[test]
    fn failed_set_param_leaves_config_unchanged() {
        let mut config = DurabilityConfig::default();
        let before = config.clone();

        assert!(config.set_param("sync_policy", "bogus").is_err());
        assert!(config.set_param("log_filename", "").is_err());
        assert!(config.set_param("compaction_min_size", "abc").is_err());

        assert_eq!(config, before);
    }

    #[test]
    fn get_param_round_trips() {
        let config = DurabilityConfig::default();
        assert_eq!(config.get_param("sync_policy").unwrap(), "everysec");
        assert_eq!(
            config.get_param("log_filename").unwrap(),
            "appendonly.aof"
        );
        assert!(config.get_param("unknown").is_none());
    }

    #[test]
    fn params_lists_all_keys() {
        let config = DurabilityConfig::default();
        let params = config.params();
        assert_eq!(params.len(), 9);
        assert!(params.iter().all(|(_, v)| !v.is_empty()));
    }

    #[test]
    fn ensure_directories_creates_missing_dirs() {
        let temp = tempfile::tempdir().unwrap();
        let config = DurabilityConfig::new()
            .data_dir(temp.path().join("data"))
            .temp_dir(temp.path().join("data/tmp"));

        config.ensure_directories().unwrap();
        assert!(config.data_dir.is_dir());
        assert!(config.temp_dir.is_dir());
    }
}
