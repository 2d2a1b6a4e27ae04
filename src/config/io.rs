use std::path::{Path, PathBuf};

use crate::app_dirs;

use super::{CONFIG_FILE_NAME, ConfigError, WorkerConfig, map_app_dir_error};

/// Resolve the configuration file path, ensuring the parent directory exists.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let dir = app_dirs::app_root_dir().map_err(map_app_dir_error)?;
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app root, returning defaults if missing.
pub fn load_or_default() -> Result<WorkerConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`; a missing file yields defaults.
pub fn load_from(path: &Path) -> Result<WorkerConfig, ConfigError> {
    if !path.exists() {
        return Ok(WorkerConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist configuration to the app root, overwriting any previous contents.
pub fn save(config: &WorkerConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Save configuration to a specific path, creating parent directories as needed.
///
/// The file is written next to its target and renamed into place.
pub fn save_to_path(config: &WorkerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let data = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, data).map_err(|source| ConfigError::Write {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| {
        let _ = std::fs::remove_file(&tmp_path);
        ConfigError::Write {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InferenceSettings, LoggingSettings, StoreSettings};
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, WorkerConfig::default());
        assert_eq!(cfg.logging.filter, "info");
        assert_eq!(cfg.logging.max_files, 10);
    }

    #[test]
    fn saves_and_reloads_settings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let cfg = WorkerConfig {
            store: StoreSettings {
                data_root: Some(PathBuf::from("/srv/projects")),
            },
            inference: InferenceSettings {
                batch_size_limit: Some(64),
            },
            logging: LoggingSettings {
                filter: "aiworker=debug".to_string(),
                max_files: 3,
            },
        };
        save_to_path(&cfg, &path).unwrap();
        assert!(!path.with_extension("toml.tmp").exists());
        assert_eq!(load_from(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[inference]\nbatch_size_limit = 8\n").unwrap();
        let cfg = load_from(&path).unwrap();
        assert_eq!(cfg.inference.batch_size_limit, Some(8));
        assert_eq!(cfg.store.data_root, None);
        assert_eq!(cfg.logging, LoggingSettings::default());
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[inference\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { path: p, .. } if p == path));
    }
}
