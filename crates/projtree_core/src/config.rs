//! Runtime configuration resolved from environment variables.
//!
//! # Responsibility
//! - Resolve database path, log settings and list paging for binaries.
//!
//! # Invariants
//! - Unset or blank variables fall back to defaults.
//! - Set but malformed variables are errors, never silently ignored.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "PROJTREE_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "PROJTREE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "PROJTREE_LOG_DIR";
pub const ENV_PAGE_LIMIT: &str = "PROJTREE_PAGE_LIMIT";

pub const DEFAULT_DB_PATH: &str = "projtree.sqlite3";
pub const DEFAULT_PAGE_LIMIT: u32 = 100;

/// Errors from configuration resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidPageLimit(String),
    RelativeLogDir(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPageLimit(raw) => write!(
                f,
                "{ENV_PAGE_LIMIT} must be a positive integer, got `{raw}`"
            ),
            Self::RelativeLogDir(raw) => {
                write!(f, "{ENV_LOG_DIR} must be an absolute path, got `{raw}`")
            }
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// `None` logs to stderr.
    pub log_dir: Option<PathBuf>,
    /// Page size for employee/project list fetches.
    pub page_limit: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: default_log_level().to_string(),
            log_dir: None,
            page_limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl CoreConfig {
    /// Reads the `PROJTREE_*` variables of the current process.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(level) = read(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            let dir = PathBuf::from(&dir);
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir.display().to_string()));
            }
            config.log_dir = Some(dir);
        }
        if let Some(raw) = read(ENV_PAGE_LIMIT) {
            config.page_limit = match raw.parse::<u32>() {
                Ok(limit) if limit > 0 => limit,
                _ => return Err(ConfigError::InvalidPageLimit(raw)),
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, DEFAULT_PAGE_LIMIT};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn resolve(vars: &[(&str, &str)]) -> Result<CoreConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoreConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = resolve(&[]).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.page_limit, DEFAULT_PAGE_LIMIT);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = resolve(&[
            ("PROJTREE_DB_PATH", "/tmp/p.sqlite3"),
            ("PROJTREE_LOG_LEVEL", "warn"),
            ("PROJTREE_LOG_DIR", "/var/log/projtree"),
            ("PROJTREE_PAGE_LIMIT", " 25 "),
        ])
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/p.sqlite3"));
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/projtree")));
        assert_eq!(config.page_limit, 25);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_eq!(
            resolve(&[("PROJTREE_PAGE_LIMIT", "0")]).unwrap_err(),
            ConfigError::InvalidPageLimit("0".to_string())
        );
        assert!(resolve(&[("PROJTREE_PAGE_LIMIT", "many")]).is_err());
        assert!(matches!(
            resolve(&[("PROJTREE_LOG_DIR", "logs")]),
            Err(ConfigError::RelativeLogDir(_))
        ));
        assert_eq!(resolve(&[("PROJTREE_DB_PATH", "   ")]).unwrap(), CoreConfig::default());
    }
}
