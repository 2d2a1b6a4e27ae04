//! Worker startup: configuration, logging and per-project wiring.

use std::path::{Path, PathBuf};

use crate::config::{self, ConfigError, WorkerConfig};
use crate::logging::{self, LoggingError};
use crate::orchestrator::Orchestrator;
use crate::store::{DB_FILE_NAME, ProjectRepository, ProjectStore, StoreError};

/// Resolved worker configuration, shared by every project the worker serves.
#[derive(Debug, Clone)]
pub struct Worker {
    config: WorkerConfig,
    data_root: PathBuf,
}

impl Worker {
    /// Read `config.toml` from the app root (defaults when absent) and resolve paths.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_config(config::load_or_default()?)
    }

    pub fn from_config(config: WorkerConfig) -> Result<Self, ConfigError> {
        let data_root = config.store.resolve_data_root()?;
        Ok(Self { config, data_root })
    }

    /// Install the global subscriber from the `[logging]` section.
    pub fn init_logging(&self) -> Result<(), LoggingError> {
        logging::init(&self.config.logging)
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn project_db_path(&self, project: &str) -> PathBuf {
        self.data_root.join(project).join(DB_FILE_NAME)
    }

    pub fn open_project(&self, project: &str) -> Result<ProjectStore, StoreError> {
        ProjectStore::open(&self.data_root, project)
    }

    /// Orchestrator over `repo` with the configured inference batch limit.
    pub fn orchestrator<'r, R: ProjectRepository + ?Sized>(
        &self,
        repo: &'r R,
    ) -> Orchestrator<'r, R> {
        Orchestrator::new(repo)
            .with_default_batch_size_limit(self.config.inference.batch_size_limit)
    }
}
