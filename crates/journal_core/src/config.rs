//! Runtime configuration for one journal installation.
//!
//! # Invariants
//! - Every field has a usable default; missing variables never fail.
//! - Blank variable values count as unset.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_VAR: &str = "JOURNAL_DB_PATH";
pub const LOG_LEVEL_VAR: &str = "JOURNAL_LOG_LEVEL";
pub const LOG_DIR_VAR: &str = "JOURNAL_LOG_DIR";
pub const DEFAULT_DB_FILE: &str = "journal.sqlite3";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// Reads `JOURNAL_DB_PATH`, `JOURNAL_LOG_LEVEL` and `JOURNAL_LOG_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();
        Self {
            db_path: read(DB_PATH_VAR).map_or(defaults.db_path, PathBuf::from),
            log_level: read(LOG_LEVEL_VAR).unwrap_or(defaults.log_level),
            log_dir: read(LOG_DIR_VAR).map(PathBuf::from),
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, DB_PATH_VAR, DEFAULT_DB_FILE, LOG_DIR_VAR, LOG_LEVEL_VAR};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[test]
    fn missing_and_blank_variables_fall_back_to_defaults() {
        let vars = HashMap::from([(LOG_LEVEL_VAR, "   ".to_string())]);
        let config = CoreConfig::from_lookup(|key| vars.get(key).cloned());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_FILE));
        assert_eq!(config.log_level, crate::logging::default_log_level());
        assert_eq!(config.log_dir, None);
    }

    #[test]
    fn variables_override_defaults() {
        let vars = HashMap::from([
            (DB_PATH_VAR, "/data/journal.db".to_string()),
            (LOG_LEVEL_VAR, "warn".to_string()),
            (LOG_DIR_VAR, "/var/log/journal".to_string()),
        ]);
        let config = CoreConfig::from_lookup(|key| vars.get(key).cloned());
        assert_eq!(config.db_path, PathBuf::from("/data/journal.db"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/journal")));
    }
}
