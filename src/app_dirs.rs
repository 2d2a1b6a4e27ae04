//! Application directory helpers anchored to a single `.aiworker` folder.
//!
//! Config, logs and (by default) project databases live under the OS config
//! directory. `AIWORKER_CONFIG_HOME` overrides the base for tests or portable
//! setups.

use std::{
    path::PathBuf,
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = ".aiworker";
/// Environment variable overriding the config base directory.
pub const CONFIG_HOME_ENV: &str = "AIWORKER_CONFIG_HOME";

static CONFIG_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing application directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// No suitable base config directory could be resolved.
    #[error("No suitable base config directory available for application files")]
    NoBaseDir,
    /// Failed to create the application directory.
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the root `.aiworker` directory, creating it if needed.
pub fn app_root_dir() -> Result<PathBuf, AppDirError> {
    let base = config_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// Return the logs directory inside the app root, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("logs"))
}

/// Default data root for project databases.
pub fn projects_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_root_dir()?.join("projects"))
}

/// Pin the config base for the rest of the process, taking precedence over the environment.
pub fn set_config_base_override(path: Option<PathBuf>) {
    if let Ok(mut guard) = CONFIG_BASE_OVERRIDE.lock() {
        *guard = path;
    }
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn config_base_dir() -> Option<PathBuf> {
    if let Some(path) = CONFIG_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
    {
        return Some(path);
    }
    if let Ok(path) = std::env::var(CONFIG_HOME_ENV) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct OverrideGuard;

    impl OverrideGuard {
        fn set(path: PathBuf) -> Self {
            set_config_base_override(Some(path));
            Self
        }
    }

    impl Drop for OverrideGuard {
        fn drop(&mut self) {
            set_config_base_override(None);
        }
    }

    #[test]
    fn uses_override_for_root_and_sub_dirs() {
        let base = tempdir().unwrap();
        let _guard = OverrideGuard::set(base.path().to_path_buf());
        let root = app_root_dir().unwrap();
        assert_eq!(root, base.path().join(APP_DIR_NAME));
        assert!(root.is_dir());
        assert_eq!(logs_dir().unwrap(), root.join("logs"));
        assert!(projects_dir().unwrap().is_dir());
    }
}
