use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags, Transaction};
use thiserror::Error;

/// Read-only queries over model states, label classes and images.
pub mod read;
/// Query surface the orchestrator depends on.
pub mod repository;
/// SQLite schema management for project databases.
pub mod schema;
/// Project name validation and value codecs.
pub mod util;
/// Append-only writes: model states, predictions, feature vectors and seed rows.
pub mod write;

pub use repository::ProjectRepository;
pub use util::validate_project_name;

/// Filename of the per-project database inside its project directory.
pub const DB_FILE_NAME: &str = "project.db";

/// Errors returned when reading or writing a project database.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The project shortname cannot be used as a storage key.
    #[error("Invalid project name: {0:?}")]
    InvalidProjectName(String),
    /// SQLite query failed.
    #[error("Database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to create the project directory.
    #[error("Could not write to {path}: {source}")]
    CreateDir {
        /// Path that could not be created.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// A JSON column could not be encoded or decoded.
    #[error("Invalid JSON column {column}: {source}")]
    Json {
        /// Column holding the JSON payload.
        column: &'static str,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// A stored value does not match the expected format.
    #[error("Corrupt {column} value: {value}")]
    CorruptRow {
        /// Column holding the bad value.
        column: &'static str,
        /// The offending value.
        value: String,
    },
    /// A required project setting has not been configured.
    #[error("Project setting {0} is not configured")]
    MissingSetting(&'static str),
    /// Database is locked or busy.
    #[error("Database is busy, please retry")]
    Busy,
    /// SQLite returned an unexpected result.
    #[error("SQLite returned an unexpected result")]
    Unexpected,
}

/// SQLite database holding the state of a single annotation project.
pub struct ProjectStore {
    connection: Connection,
    project: String,
    path: PathBuf,
}

/// Groups seed writes (settings, classes, images, annotations) into one transaction.
pub struct ProjectWriteBatch<'conn> {
    tx: Transaction<'conn>,
}

impl ProjectStore {
    /// Open (or create) the database of `project` below `data_root`.
    pub fn open(data_root: impl AsRef<Path>, project: &str) -> Result<Self, StoreError> {
        validate_project_name(project)?;
        let db_path = data_root.as_ref().join(project).join(DB_FILE_NAME);
        Self::open_at(&db_path, project)
    }

    /// Open (or create) a project database at an explicit path.
    pub fn open_at(db_path: &Path, project: &str) -> Result<Self, StoreError> {
        validate_project_name(project)?;
        util::create_parent_if_needed(db_path)?;
        let connection = Connection::open(db_path)?;
        let store = Self {
            connection,
            project: project.to_string(),
            path: db_path.to_path_buf(),
        };
        store.apply_pragmas()?;
        schema::apply_schema(&store.connection)?;
        Ok(store)
    }

    /// Open an existing database read-only without applying schema migrations.
    pub fn open_read_only(db_path: &Path, project: &str) -> Result<Self, StoreError> {
        validate_project_name(project)?;
        let connection = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        connection
            .execute_batch("PRAGMA busy_timeout=5000; PRAGMA temp_store=MEMORY;")
            .map_err(util::map_sql_error)?;
        Ok(Self {
            connection,
            project: project.to_string(),
            path: db_path.to_path_buf(),
        })
    }

    /// Path of the backing database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn apply_pragmas(&self) -> Result<(), StoreError> {
        self.connection
            .execute_batch(
                "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;
             PRAGMA temp_store=MEMORY;",
            )
            .map_err(util::map_sql_error)
    }
}
