//! Runtime configuration for the block store.
//!
//! # Responsibility
//! - Resolve database path, search mode, asset base and log settings from
//!   the environment with stable defaults.
//! - Derive the [`IndexConfig`] injected into index and search services.
//!
//! # Invariants
//! - The search mode is fixed for the lifetime of the services built from
//!   one config; switching it is an administrative action.

use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "BLOCKVIEW_DB_PATH";
pub const ENV_CASE_SENSITIVE: &str = "BLOCKVIEW_CASE_SENSITIVE";
pub const ENV_ASSET_BASE: &str = "BLOCKVIEW_ASSET_BASE";
pub const ENV_LOG_LEVEL: &str = "BLOCKVIEW_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BLOCKVIEW_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "blockview.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "blockview-logs";

/// Settings consumed by the index coordinator and search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// When `true` only the case-sensitive FTS mirror is maintained.
    pub case_sensitive: bool,
    /// Absolute directory that relative `assets/...` references resolve under.
    pub asset_base: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            asset_base: std::env::temp_dir(),
        }
    }
}

/// Process-level configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    pub db_path: PathBuf,
    pub case_sensitive: bool,
    pub asset_base: PathBuf,
    pub log_level: String,
    /// Absolute directory for rotated log files.
    pub log_dir: PathBuf,
}

impl Default for KernelConfig {
    fn default() -> Self {
        let index = IndexConfig::default();
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            case_sensitive: index.case_sensitive,
            asset_base: index.asset_base,
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
        }
    }
}

impl KernelConfig {
    /// Builds a config from `BLOCKVIEW_*` environment variables.
    ///
    /// Blank or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_blank = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            db_path: non_blank(ENV_DB_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            case_sensitive: non_blank(ENV_CASE_SENSITIVE)
                .and_then(|value| parse_flag(&value))
                .unwrap_or(defaults.case_sensitive),
            asset_base: non_blank(ENV_ASSET_BASE)
                .map(PathBuf::from)
                .unwrap_or(defaults.asset_base),
            log_level: non_blank(ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_dir: non_blank(ENV_LOG_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
        }
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            case_sensitive: self.case_sensitive,
            asset_base: self.asset_base.clone(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
