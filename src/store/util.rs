use std::path::Path;

use uuid::Uuid;

use super::StoreError;
use crate::records::{StateId, StateStats};

const MAX_PROJECT_NAME_LEN: usize = 128;

/// Translate rusqlite errors into friendlier StoreError variants.
pub(super) fn map_sql_error(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(sql_err, _)
            if sql_err.extended_code == rusqlite::ffi::SQLITE_BUSY =>
        {
            StoreError::Busy
        }
        rusqlite::Error::InvalidQuery
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::MultipleStatement => StoreError::Unexpected,
        other => StoreError::Sql(other),
    }
}

/// Validate a project shortname before it becomes part of a storage path.
///
/// Only ASCII alphanumerics, `-` and `_` are accepted so the name can never
/// traverse directories or smuggle SQL.
pub fn validate_project_name(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_PROJECT_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidProjectName(name.to_string()))
    }
}

pub(super) fn create_parent_if_needed(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

pub(super) fn parse_state_id(value: &str) -> Result<StateId, StoreError> {
    Uuid::parse_str(value)
        .map(StateId::from_uuid)
        .map_err(|_| StoreError::CorruptRow {
            column: "model_state.id",
            value: value.to_string(),
        })
}

pub(super) fn encode_stats(stats: Option<&StateStats>) -> Result<Option<String>, StoreError> {
    stats
        .map(|stats| {
            serde_json::to_string(stats).map_err(|source| StoreError::Json {
                column: "model_state.stats",
                source,
            })
        })
        .transpose()
}

pub(super) fn decode_stats(raw: Option<String>) -> Result<Option<StateStats>, StoreError> {
    raw.map(|text| {
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            column: "model_state.stats",
            source,
        })
    })
    .transpose()
}

pub(super) fn encode_coordinates(
    column: &'static str,
    coordinates: Option<&Vec<f64>>,
) -> Result<Option<String>, StoreError> {
    coordinates
        .map(|coords| serde_json::to_string(coords).map_err(|source| StoreError::Json { column, source }))
        .transpose()
}

pub(super) fn decode_coordinates(
    column: &'static str,
    raw: Option<String>,
) -> Result<Option<Vec<f64>>, StoreError> {
    raw.map(|text| serde_json::from_str(&text).map_err(|source| StoreError::Json { column, source }))
        .transpose()
}
