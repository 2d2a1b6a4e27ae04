use rusqlite::Connection;

use super::StoreError;
use super::util::map_sql_error;

pub(super) fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
             CREATE TABLE IF NOT EXISTS label_class (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                idx INTEGER NOT NULL,
                created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_label_class_created_at
                ON label_class (created_at);
             CREATE TABLE IF NOT EXISTS image (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS image_feature (
                image_id TEXT PRIMARY KEY,
                fvec BLOB NOT NULL,
                updated_at INTEGER NOT NULL
             ) WITHOUT ROWID;
             CREATE TABLE IF NOT EXISTS annotation (
                id TEXT PRIMARY KEY,
                image TEXT NOT NULL,
                label TEXT,
                x REAL,
                y REAL,
                width REAL,
                height REAL,
                coordinates TEXT,
                segmentation_mask TEXT,
                FOREIGN KEY(image) REFERENCES image(id) ON DELETE CASCADE
             );
             CREATE INDEX IF NOT EXISTS idx_annotation_image ON annotation (image);
             CREATE TABLE IF NOT EXISTS model_state (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                created_at INTEGER NOT NULL,
                partial INTEGER NOT NULL,
                model_library TEXT NOT NULL,
                criterion_library TEXT,
                stats TEXT,
                state_dict BLOB NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_model_state_library_partial_created
                ON model_state (model_library, partial, created_at);
             CREATE TABLE IF NOT EXISTS prediction (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                image TEXT NOT NULL,
                model_state TEXT,
                label TEXT,
                confidence REAL,
                priority REAL,
                x REAL,
                y REAL,
                width REAL,
                height REAL,
                coordinates TEXT,
                segmentation_mask TEXT,
                created_at INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_prediction_image ON prediction (image);
             CREATE INDEX IF NOT EXISTS idx_prediction_model_state ON prediction (model_state);",
        )
        .map_err(map_sql_error)?;
    Ok(())
}
