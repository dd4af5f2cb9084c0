//! Minimal configuration loading for the RTVT session client.
//!
//! Kept dependency-light so any crate embedding the client can import it.
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtvtconf::RtvtConfig;
//!
//! let config = RtvtConfig::load().expect("Failed to load config");
//! println!("endpoint: {}", config.service.endpoint);
//! println!("heartbeat every {}ms", config.timing.heartbeat_interval_ms);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/rtvt/config.toml` (system)
//! 2. `~/.config/rtvt/config.toml` (user)
//! 3. `./rtvt.toml` (local override, or an explicit path)
//! 4. Environment variables (`RTVT_*`)
//!
//! # Example Config
//!
//! ```toml
//! [service]
//! endpoint = "wss://translate.example.com:14001"
//! pid = 90008000
//! uid = "speaker-1"
//!
//! [timing]
//! request_timeout_ms = 5000
//! heartbeat_interval_ms = 5000
//! reconnect_interval_ms = 5000
//!
//! [telemetry]
//! log_level = "rtvt=debug,info"
//! ```

pub mod loader;
pub mod sections;

pub use loader::{discover_config_files_with_override, ConfigSources};
pub use sections::{ServiceConfig, TelemetryConfig, TimingConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RtvtConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl RtvtConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with an explicit file replacing `./rtvt.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::from("# RTVT Client Configuration\n\n");
        output.push_str(&toml::to_string_pretty(self).unwrap_or_default());
        output
    }
}
