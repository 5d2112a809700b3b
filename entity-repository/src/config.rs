//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: ENTITY_REPOSITORY_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/entity-repository/{app_name}/config.toml
//! 4. System directory: /etc/entity-repository/{app_name}/config.toml
//! 5. Default values
//!
//! # Example
//!
//! ```toml
//! [repository]
//! disable_tracking = false
//! reject_mixed_capability = true
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//! ```
//!
//! `ENTITY_REPOSITORY_REPOSITORY__DISABLE_TRACKING=false` overrides the first key.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

const ENV_PREFIX: &str = "ENTITY_REPOSITORY_";
const CONFIG_PREFIX: &str = "entity-repository";

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Repository behavior
    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Repository behavior shared by every entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Reads return detached entities unless a query asks for tracking
    #[serde(default = "default_true")]
    pub disable_tracking: bool,

    /// Fail batch deletes whose entities disagree on soft-delete capability
    /// instead of classifying the batch by its first element
    #[serde(default)]
    pub reject_mixed_capability: bool,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            disable_tracking: default_true(),
            reject_mixed_capability: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Human-readable, multi-line output
    Pretty,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Pretty => write!(f, "pretty"),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The application name is inferred from the running binary.
    pub fn load() -> Result<Self> {
        let app_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| CONFIG_PREFIX.to_string());

        Self::load_for_app(&app_name)
    }

    /// Load configuration for a specific application name
    pub fn load_for_app(app_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(app_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Lowest priority first so later merges win
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        let config = figment.merge(Self::env()).extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// Bypasses the XDG and system directories. A missing file yields the
    /// defaults; environment variables still apply.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Self::env())
            .extract()?;

        Ok(config)
    }

    fn env() -> Env {
        Env::prefixed(ENV_PREFIX).split("__")
    }

    /// Candidate config file paths, highest priority first
    fn find_config_paths(app_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(CONFIG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file(Path::new(app_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_PREFIX)
                .join(app_name)
                .join("config.toml"),
        );

        paths
    }
}
