//! Project configuration (`livedev.toml`).
//!
//! | Section   | Purpose                                     |
//! |-----------|---------------------------------------------|
//! | `[serve]` | Bind addresses and the served directory     |
//! | `[live]`  | Highlighting, stylesheet polling, requests  |
//!
//! A missing config file is not an error: every field has a default.
//! Unknown fields are reported and ignored.

mod section;
mod types;

pub use section::{LiveSection, ServeConfig};
pub use types::{ConfigError, cfg, init_config};

use crate::cli::{Cli, Commands, ServeArgs};
use crate::{debug, log};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure for `livedev.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Path the configuration was read from (may not exist).
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub live: LiveSection,
}

impl LiveConfig {
    /// Load the configuration named on the command line and apply CLI overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config = if cli.config.exists() {
            Self::from_path(&cli.config)?
        } else {
            debug!("config"; "{} not found, using defaults", cli.config.display());
            Self::default()
        };
        config.config_path = cli.config.clone();

        if let Commands::Serve { args } = &cli.command {
            config.apply_serve_args(args);
        }
        config.resolve_root();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (mut config, ignored) = Self::parse_with_ignored(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        config.config_path = path.to_path_buf();
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

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}: {}", display_path, fields.join(", "));
    }

    /// Directory containing the config file; relative paths resolve against it.
    pub fn base_dir(&self) -> PathBuf {
        match self.config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Apply serve-specific CLI options.
    fn apply_serve_args(&mut self, args: &ServeArgs) {
        Self::update_option(&mut self.serve.interface, args.interface.as_ref());
        Self::update_option(&mut self.serve.port, args.port.as_ref());
        Self::update_option(&mut self.serve.ws_port, args.ws_port.as_ref());
        Self::update_option(&mut self.serve.watch, args.watch.as_ref());
        if let Some(root) = &args.root {
            // CLI paths are relative to the working directory, not the config file.
            self.serve.root = std::path::absolute(root).unwrap_or_else(|_| root.clone());
        }
    }

    /// Update config option if CLI value is provided.
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    fn resolve_root(&mut self) {
        if self.serve.root.is_relative() {
            self.serve.root = self.base_dir().join(&self.serve.root);
        }
    }

    /// Validate every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serve.validate().map_err(ConfigError::Validation)?;
        self.live.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config text. Panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> LiveConfig {
    let (parsed, ignored) = LiveConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
