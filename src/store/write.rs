use rusqlite::params;

use super::read::{
    SETTING_ANNOTATION_TYPE, SETTING_CRITERION_LIBRARY, SETTING_MODEL_LIBRARY,
    SETTING_PREDICTION_TYPE,
};
use super::util::{encode_coordinates, encode_stats, map_sql_error};
use super::{ProjectStore, ProjectWriteBatch, StoreError};
use crate::records::{
    Annotation, FeatureVectorRow, ImageRecord, LabelClass, ModelLibrary, NewModelState,
    PredictionRow, ProjectSettings, StateId, now_micros,
};

impl ProjectStore {
    /// Insert a new model state row. Rows are never updated afterwards.
    pub fn insert_state(&self, state: &NewModelState) -> Result<(StateId, i64), StoreError> {
        let id = StateId::new();
        let created_at = now_micros();
        let stats = encode_stats(state.stats.as_ref())?;
        self.connection
            .prepare_cached(
                "INSERT INTO model_state
                    (id, created_at, partial, model_library, criterion_library, stats, state_dict)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .map_err(map_sql_error)?
            .execute(params![
                id.to_string(),
                created_at,
                state.partial as i64,
                state.model_library.as_str(),
                state.criterion_library,
                stats,
                state.state_dict,
            ])
            .map_err(map_sql_error)?;
        Ok((id, created_at))
    }

    /// Delete every partial state of `library`, returning how many rows went away.
    pub fn delete_all_partial(&self, library: &ModelLibrary) -> Result<usize, StoreError> {
        self.connection
            .execute(
                "DELETE FROM model_state WHERE model_library = ?1 AND partial != 0",
                params![library.as_str()],
            )
            .map_err(map_sql_error)
    }

    /// Append prediction rows in a single transaction.
    pub fn insert_predictions(&self, rows: &[PredictionRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let created_at = now_micros();
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO prediction
                        (image, model_state, label, confidence, priority, x, y, width, height,
                         coordinates, segmentation_mask, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                )
                .map_err(map_sql_error)?;
            for row in rows {
                let coordinates =
                    encode_coordinates("prediction.coordinates", row.coordinates.as_ref())?;
                stmt.execute(params![
                    row.image.as_str(),
                    row.model_state.map(|id| id.to_string()),
                    row.label,
                    row.confidence,
                    row.priority,
                    row.x,
                    row.y,
                    row.width,
                    row.height,
                    coordinates,
                    row.segmentation_mask,
                    created_at,
                ])
                .map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(rows.len())
    }

    /// Insert or replace per-image feature vectors keyed by image id.
    pub fn upsert_feature_vectors(&self, rows: &[FeatureVectorRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let updated_at = now_micros();
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT INTO image_feature (image_id, fvec, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(image_id) DO UPDATE SET fvec = excluded.fvec,
                                                        updated_at = excluded.updated_at",
                )
                .map_err(map_sql_error)?;
            for row in rows {
                stmt.execute(params![row.image.as_str(), row.vector, updated_at])
                    .map_err(map_sql_error)?;
            }
        }
        tx.commit().map_err(map_sql_error)?;
        Ok(rows.len())
    }

    /// Start a batch of seed writes performed on behalf of project administration.
    pub fn write_batch(&self) -> Result<ProjectWriteBatch<'_>, StoreError> {
        let tx = self
            .connection
            .unchecked_transaction()
            .map_err(map_sql_error)?;
        Ok(ProjectWriteBatch { tx })
    }
}

impl<'conn> ProjectWriteBatch<'conn> {
    /// Persist the project's geometry types and configured libraries.
    pub fn set_project_settings(&mut self, settings: &ProjectSettings) -> Result<(), StoreError> {
        self.set_setting(SETTING_ANNOTATION_TYPE, Some(settings.annotation_type.as_str()))?;
        self.set_setting(SETTING_PREDICTION_TYPE, Some(settings.prediction_type.as_str()))?;
        self.set_setting(
            SETTING_MODEL_LIBRARY,
            settings.model_library.as_ref().map(ModelLibrary::as_str),
        )?;
        self.set_setting(SETTING_CRITERION_LIBRARY, settings.criterion_library.as_deref())
    }

    /// Add a label class; classes are never renumbered.
    pub fn insert_label_class(&mut self, class: &LabelClass) -> Result<(), StoreError> {
        self.tx
            .prepare_cached(
                "INSERT INTO label_class (id, name, idx, created_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(map_sql_error)?
            .execute(params![class.id, class.name, class.index, class.created_at])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Register an image; existing rows keep their filename.
    pub fn insert_image(&mut self, image: &ImageRecord) -> Result<(), StoreError> {
        self.tx
            .prepare_cached("INSERT OR IGNORE INTO image (id, filename) VALUES (?1, ?2)")
            .map_err(map_sql_error)?
            .execute(params![image.id.as_str(), image.filename])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Store a user annotation for an already registered image.
    pub fn insert_annotation(&mut self, annotation: &Annotation) -> Result<(), StoreError> {
        let coordinates =
            encode_coordinates("annotation.coordinates", annotation.coordinates.as_ref())?;
        self.tx
            .prepare_cached(
                "INSERT INTO annotation
                    (id, image, label, x, y, width, height, coordinates, segmentation_mask)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .map_err(map_sql_error)?
            .execute(params![
                annotation.id,
                annotation.image.as_str(),
                annotation.label,
                annotation.x,
                annotation.y,
                annotation.width,
                annotation.height,
                coordinates,
                annotation.segmentation_mask,
            ])
            .map_err(map_sql_error)?;
        Ok(())
    }

    /// Commit all batched operations atomically.
    pub fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().map_err(map_sql_error)?;
        Ok(())
    }

    fn set_setting(&mut self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        match value {
            Some(value) => {
                self.tx
                    .prepare_cached(
                        "INSERT INTO settings (key, value) VALUES (?1, ?2)
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    )
                    .map_err(map_sql_error)?
                    .execute(params![key, value])
                    .map_err(map_sql_error)?;
            }
            None => {
                self.tx
                    .prepare_cached("DELETE FROM settings WHERE key = ?1")
                    .map_err(map_sql_error)?
                    .execute(params![key])
                    .map_err(map_sql_error)?;
            }
        }
        Ok(())
    }
}
