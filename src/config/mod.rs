//! Worker configuration stored as TOML under the application root.

mod io;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;

pub use io::{config_path, load_from, load_or_default, save, save_to_path};

/// Default filename used to store the worker configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Default cap on retained log files.
pub const DEFAULT_MAX_LOG_FILES: usize = 10;

/// Settings persisted in `config.toml`. Every section may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub inference: InferenceSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Where project databases live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Root folder holding one sub-folder per project; defaults to the app data dir.
    #[serde(default)]
    pub data_root: Option<PathBuf>,
}

impl StoreSettings {
    /// Configured data root, or `<app root>/projects`.
    pub fn resolve_data_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.data_root {
            Some(path) => Ok(path.clone()),
            None => app_dirs::projects_dir().map_err(map_app_dir_error),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Images per inference chunk when a request carries no limit. Unset or 0 disables chunking.
    #[serde(default)]
    pub batch_size_limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    DEFAULT_MAX_LOG_FILES
}

/// Errors that may occur while loading or saving the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found")]
    NoConfigDir,
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> ConfigError {
    match error {
        app_dirs::AppDirError::NoBaseDir => ConfigError::NoConfigDir,
        app_dirs::AppDirError::CreateDir { path, source } => ConfigError::CreateDir { path, source },
    }
}
