//! Tracing setup for the worker.
//!
//! One global subscriber fans out to stdout and to a log file created per
//! launch. Only the newest `max_files` worker logs are kept in the directory.

use std::{
    fs::{self, File, OpenOptions},
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs;
use crate::config::LoggingSettings;

/// Prefix of every log file the worker writes; pruning ignores other files.
pub const LOG_FILE_PREFIX: &str = "aiworker";

static FILE_WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("No application directory available for worker logs")]
    NoLogDir,
    #[error("Failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to list log directory {path}: {source}")]
    ListDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to delete stale log file {path}: {source}")]
    DeleteFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log file timestamp: {0}")]
    Timestamp(time::error::Format),
    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(tracing::subscriber::SetGlobalDefaultError),
}

/// Install the worker subscriber, logging into `<app root>/logs`.
///
/// Repeated calls after a successful one do nothing.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    if FILE_WRITER_GUARD.get().is_some() {
        return Ok(());
    }
    let log_dir = app_dirs::logs_dir().map_err(|err| match err {
        app_dirs::AppDirError::NoBaseDir => LoggingError::NoLogDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            LoggingError::CreateDir { path, source }
        }
    })?;
    init_in(&log_dir, settings)
}

/// Install the worker subscriber with its log file inside `log_dir`.
///
/// `RUST_LOG` takes precedence over `settings.filter`.
pub fn init_in(log_dir: &Path, settings: &LoggingSettings) -> Result<(), LoggingError> {
    if FILE_WRITER_GUARD.get().is_some() {
        return Ok(());
    }
    fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;
    let log_path = log_dir.join(log_file_name(local_now())?);
    let file = open_log_file(&log_path)?;
    let removed = retain_newest_logs(log_dir, settings.max_files.max(1))?;

    let (file_writer, guard) = tracing_appender::non_blocking(file);
    let filter = env_filter(&settings.filter);
    let timer = local_timer();
    let subscriber = Registry::default()
        .with(filter)
        .with(
            fmt::layer()
                .with_timer(timer.clone())
                .with_writer(std::io::stdout),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(file_writer),
        );
    tracing::subscriber::set_global_default(subscriber)
        .map_err(LoggingError::AlreadyInstalled)?;
    let _ = FILE_WRITER_GUARD.set(guard);

    tracing::info!(
        log_file = %log_path.display(),
        removed,
        "Worker logging initialized"
    );
    Ok(())
}

fn open_log_file(path: &Path) -> Result<File, LoggingError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LoggingError::OpenFile {
            path: path.to_path_buf(),
            source,
        })
}

/// Delete all but the `keep` most recently modified worker logs; returns how many went.
fn retain_newest_logs(dir: &Path, keep: usize) -> Result<usize, LoggingError> {
    let listing = fs::read_dir(dir).map_err(|source| LoggingError::ListDir {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut logs: Vec<(SystemTime, PathBuf)> = listing
        .filter_map(Result::ok)
        .filter(|entry| is_worker_log(&entry.path()))
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|meta| meta.is_file())?;
            let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            Some((modified, entry.path()))
        })
        .collect();
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let stale: Vec<PathBuf> = logs.into_iter().skip(keep).map(|(_, path)| path).collect();
    for path in &stale {
        fs::remove_file(path).map_err(|source| LoggingError::DeleteFile {
            path: path.clone(),
            source,
        })?;
    }
    Ok(stale.len())
}

fn is_worker_log(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.starts_with(LOG_FILE_PREFIX) && name.ends_with(".log")
}

fn log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    const STAMP: &[FormatItem<'_>] =
        format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    let stamp = now.format(STAMP).map_err(LoggingError::Timestamp)?;
    Ok(format!("{LOG_FILE_PREFIX}_{stamp}.log"))
}

fn local_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const EVENT_TIME: &[FormatItem<'static>] =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, EVENT_TIME.into())
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn env_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
