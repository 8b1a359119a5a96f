//! Application configuration for `wavesync.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # [serve], [sync], [tasks]
//! ├── error.rs       # ConfigError
//! ├── util.rs        # config file discovery
//! └── mod.rs         # AppConfig (this file)
//! ```
//!
//! A missing config file means defaults. The loaded value is immutable and
//! shared as `Arc<AppConfig>`.

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{ServeConfig, SyncConfig, TasksConfig};
use util::find_config_file;

use crate::{cli::Cli, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing wavesync.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Absolute path to the config file, if one was found (internal use only)
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Listener settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Page synchronization settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Background task settings
    #[serde(default)]
    pub tasks: TasksConfig,
}

impl AppConfig {
    /// Load configuration for a CLI invocation.
    ///
    /// Searches upward from cwd for the config file, then applies CLI
    /// overrides and validates.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = match find_config_file(&cli.config) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => Self::default(),
        };

        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Print warning about unknown fields. They are ignored, never fatal.
    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("config"; "unknown fields in {}, ignoring: {}", display_path, fields.join(", "));
    }

    /// Apply `serve` flags over the file values.
    fn apply_cli(&mut self, cli: &Cli) {
        let Some(args) = cli.serve_args() else {
            return;
        };
        if let Some(interface) = args.interface {
            self.serve.interface = interface;
        }
        if let Some(port) = args.port {
            self.serve.port = port;
        }
        if args.verbose {
            self.serve.verbose = true;
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.channel_capacity == 0 {
            return Err(ConfigError::Validation(
                "[sync] channel_capacity must be greater than 0".into(),
            ));
        }
        if self.tasks.pool_size == 0 {
            return Err(ConfigError::Validation(
                "[tasks] pool_size must be greater than 0".into(),
            ));
        }
        if self.tasks.max_running_time == 0 {
            return Err(ConfigError::Validation(
                "[tasks] max_running_time must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Parse a config string for tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> AppConfig {
    toml::from_str(content).expect("test config should parse")
}
