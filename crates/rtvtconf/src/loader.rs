//! Config file discovery, table merging, and environment variable overlay.

use crate::{ConfigError, RtvtConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local). Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with an explicit override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/rtvt/config.toml");
    if system.exists() {
        files.push(system);
    }

    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("rtvt/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("rtvt.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents
        .parse()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Load config from a single TOML file.
pub fn load_from_file(path: &Path) -> Result<RtvtConfig, ConfigError> {
    from_table(load_table(path)?, path)
}

/// Deserialize a (possibly merged) table, filling defaults for absent keys.
pub fn from_table(table: toml::Table, path: &Path) -> Result<RtvtConfig, ConfigError> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e: toml::de::Error| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Merge `overlay` into `base` key by key; nested tables merge, scalars replace.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut RtvtConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("RTVT_ENDPOINT") {
        config.service.endpoint = v;
        sources.env_overrides.push("RTVT_ENDPOINT".to_string());
    }
    if let Ok(v) = env::var("RTVT_PID") {
        if let Ok(pid) = v.parse() {
            config.service.pid = pid;
            sources.env_overrides.push("RTVT_PID".to_string());
        }
    }
    if let Ok(v) = env::var("RTVT_UID") {
        config.service.uid = v;
        sources.env_overrides.push("RTVT_UID".to_string());
    }

    if let Ok(v) = env::var("RTVT_REQUEST_TIMEOUT_MS") {
        if let Ok(ms) = v.parse() {
            config.timing.request_timeout_ms = ms;
            sources.env_overrides.push("RTVT_REQUEST_TIMEOUT_MS".to_string());
        }
    }
    if let Ok(v) = env::var("RTVT_RECONNECT_INTERVAL_MS") {
        if let Ok(ms) = v.parse() {
            config.timing.reconnect_interval_ms = ms;
            sources.env_overrides.push("RTVT_RECONNECT_INTERVAL_MS".to_string());
        }
    }

    if let Ok(v) = env::var("RTVT_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RTVT_LOG_LEVEL".to_string());
    }
    // Also support RUST_LOG
    if let Ok(v) = env::var("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}
