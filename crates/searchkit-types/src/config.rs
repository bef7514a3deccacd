//! Configuration loading for searchkit.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `~/.config/searchkit/config.toml`
//! (platform equivalent via `directories`).

use std::collections::HashSet;
use std::path::PathBuf;

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::bounds::{Limit, Timeout, WorkerBounds};
use crate::error::TypesError;

/// Kind of collection a settings entry describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    /// Walk a directory tree
    #[default]
    Filesystem,
}

/// Settings for one configured collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    /// Collection id, unique across the configuration
    pub id: String,

    #[serde(default)]
    pub kind: CollectionKind,

    /// Root path for filesystem collections
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Glob patterns (relative to `path`) selecting items
    #[serde(default = "default_include")]
    pub include: Vec<String>,

    /// Overrides the collection's default unique field
    #[serde(default)]
    pub unique_field: Option<String>,
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_string()]
}

impl CollectionSettings {
    pub fn filesystem(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind: CollectionKind::Filesystem,
            path: Some(path.into()),
            include: default_include(),
            unique_field: None,
        }
    }
}

/// Limit and timeout applied by collectors and indexers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Max items per run (absent = unbounded)
    #[serde(default)]
    pub limit: Option<usize>,

    /// Max seconds per run (absent = unbounded)
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl AgentSettings {
    pub fn bounds(&self) -> WorkerBounds {
        WorkerBounds {
            limit: Limit::from(self.limit),
            timeout: Timeout::from(self.timeout_secs),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub collections: Vec<CollectionSettings>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            agent: AgentSettings::default(),
            collections: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/searchkit/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SEARCHKIT_*, `__` for nesting)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, TypesError> {
        let config_dir = ProjectDirs::from("", "", "searchkit")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())
            .map_err(|e| TypesError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SEARCHKIT_LOG_LEVEL, SEARCHKIT_AGENT__LIMIT, SEARCHKIT_AGENT__TIMEOUT_SECS
        builder = builder.add_source(
            Environment::with_prefix("SEARCHKIT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder
            .build()
            .map_err(|e| TypesError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| TypesError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject empty or duplicate collection ids and incomplete entries.
    pub fn validate(&self) -> Result<(), TypesError> {
        let mut seen = HashSet::new();
        for collection in &self.collections {
            if collection.id.trim().is_empty() {
                return Err(TypesError::Config("collection id must not be empty".into()));
            }
            if !seen.insert(collection.id.as_str()) {
                return Err(TypesError::Config(format!(
                    "duplicate collection id: {}",
                    collection.id
                )));
            }
            if collection.kind == CollectionKind::Filesystem && collection.path.is_none() {
                return Err(TypesError::Config(format!(
                    "filesystem collection '{}' needs a path",
                    collection.id
                )));
            }
        }
        Ok(())
    }
}
