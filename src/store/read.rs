use rusqlite::{OptionalExtension, Row, params};

use super::util::{decode_coordinates, decode_stats, map_sql_error, parse_state_id};
use super::{ProjectStore, StoreError};
use crate::records::{
    Annotation, ImageId, ImageRecord, LabelClass, ModelLibrary, ModelState, PredictionRow,
    PredictionType, ProjectSettings,
};

pub(super) const SETTING_ANNOTATION_TYPE: &str = "annotation_type";
pub(super) const SETTING_PREDICTION_TYPE: &str = "prediction_type";
pub(super) const SETTING_MODEL_LIBRARY: &str = "model_library";
pub(super) const SETTING_CRITERION_LIBRARY: &str = "criterion_library";

const STATE_COLUMNS: &str =
    "id, created_at, partial, model_library, criterion_library, stats, state_dict";

impl ProjectStore {
    /// Most recent non-partial state of `library`, ties broken by insertion order.
    pub fn latest_state(&self, library: &ModelLibrary) -> Result<Option<ModelState>, StoreError> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM model_state
             WHERE model_library = ?1 AND partial = 0
             ORDER BY created_at DESC, seq DESC
             LIMIT 1"
        );
        let raw = self
            .connection
            .query_row(&sql, params![library.as_str()], read_state_row)
            .optional()
            .map_err(map_sql_error)?;
        raw.map(RawState::into_state).transpose()
    }

    /// All partial states of `library` in insertion order.
    pub fn partial_states(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM model_state
             WHERE model_library = ?1 AND partial != 0
             ORDER BY seq ASC"
        );
        self.query_states(&sql, library)
    }

    /// Every state of `library`, newest first.
    pub fn list_states(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError> {
        let sql = format!(
            "SELECT {STATE_COLUMNS} FROM model_state
             WHERE model_library = ?1
             ORDER BY created_at DESC, seq DESC"
        );
        self.query_states(&sql, library)
    }

    /// Count label classes created at or after `since` (unix microseconds).
    pub fn count_label_classes_since(&self, since: i64) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row(
                "SELECT COUNT(*) FROM label_class WHERE created_at >= ?1",
                params![since],
                |row| row.get(0),
            )
            .map_err(map_sql_error)?;
        Ok(count.max(0) as u64)
    }

    /// All label classes ordered by their output index.
    pub fn label_classes(&self) -> Result<Vec<LabelClass>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT id, name, idx, created_at FROM label_class ORDER BY idx ASC")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LabelClass {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    index: row.get(2)?,
                    created_at: row.get(3)?,
                })
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Images for the given ids in request order; unknown ids are skipped.
    pub fn images(&self, ids: &[ImageId]) -> Result<Vec<ImageRecord>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT id, filename FROM image WHERE id = ?1")
            .map_err(map_sql_error)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let record = stmt
                .query_row(params![id.as_str()], read_image_row)
                .optional()
                .map_err(map_sql_error)?;
            if let Some(record) = record {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Every image of the project ordered by id.
    pub fn all_images(&self) -> Result<Vec<ImageRecord>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached("SELECT id, filename FROM image ORDER BY id ASC")
            .map_err(map_sql_error)?;
        let rows = stmt
            .query_map([], read_image_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        Ok(rows)
    }

    /// Annotations of the given images, restricted to the geometry of `annotation_type`.
    pub fn annotations(
        &self,
        ids: &[ImageId],
        annotation_type: PredictionType,
    ) -> Result<Vec<Annotation>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT id, image, label, x, y, width, height, coordinates, segmentation_mask
                 FROM annotation WHERE image = ?1 ORDER BY id ASC",
            )
            .map_err(map_sql_error)?;
        let mut out = Vec::new();
        for id in ids {
            let rows = stmt
                .query_map(params![id.as_str()], |row| {
                    Ok((
                        Annotation {
                            id: row.get(0)?,
                            image: ImageId::new(row.get::<_, String>(1)?),
                            label: row.get(2)?,
                            x: row.get(3)?,
                            y: row.get(4)?,
                            width: row.get(5)?,
                            height: row.get(6)?,
                            coordinates: None,
                            segmentation_mask: row.get(8)?,
                        },
                        row.get::<_, Option<String>>(7)?,
                    ))
                })
                .map_err(map_sql_error)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_sql_error)?;
            for (mut annotation, coordinates) in rows {
                annotation.coordinates =
                    decode_coordinates("annotation.coordinates", coordinates)?;
                out.push(restrict_to_geometry(annotation, annotation_type));
            }
        }
        Ok(out)
    }

    /// Project-wide annotation/prediction types and configured libraries.
    pub fn project_settings(&self) -> Result<ProjectSettings, StoreError> {
        let annotation_type = self
            .setting(SETTING_ANNOTATION_TYPE)?
            .ok_or(StoreError::MissingSetting(SETTING_ANNOTATION_TYPE))?;
        let prediction_type = self
            .setting(SETTING_PREDICTION_TYPE)?
            .ok_or(StoreError::MissingSetting(SETTING_PREDICTION_TYPE))?;
        Ok(ProjectSettings {
            annotation_type: parse_prediction_type(SETTING_ANNOTATION_TYPE, &annotation_type)?,
            prediction_type: parse_prediction_type(SETTING_PREDICTION_TYPE, &prediction_type)?,
            model_library: self.setting(SETTING_MODEL_LIBRARY)?.map(ModelLibrary::new),
            criterion_library: self.setting(SETTING_CRITERION_LIBRARY)?,
        })
    }

    /// Predictions stored for an image, oldest first.
    pub fn predictions_for_image(&self, image: &ImageId) -> Result<Vec<PredictionRow>, StoreError> {
        let mut stmt = self
            .connection
            .prepare_cached(
                "SELECT image, model_state, label, confidence, priority, x, y, width, height,
                        coordinates, segmentation_mask
                 FROM prediction WHERE image = ?1 ORDER BY seq ASC",
            )
            .map_err(map_sql_error)?;
        let raw = stmt
            .query_map(params![image.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    [
                        row.get::<_, Option<f64>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<f64>>(5)?,
                        row.get::<_, Option<f64>>(6)?,
                        row.get::<_, Option<f64>>(7)?,
                        row.get::<_, Option<f64>>(8)?,
                    ],
                    row.get::<_, Option<String>>(9)?,
                    row.get::<_, Option<String>>(10)?,
                ))
            })
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        raw.into_iter()
            .map(|(image, state, label, numbers, coordinates, mask)| {
                let [confidence, priority, x, y, width, height] = numbers;
                Ok(PredictionRow {
                    image: ImageId::new(image),
                    model_state: state.as_deref().map(parse_state_id).transpose()?,
                    label,
                    confidence,
                    priority,
                    x,
                    y,
                    width,
                    height,
                    coordinates: decode_coordinates("prediction.coordinates", coordinates)?,
                    segmentation_mask: mask,
                })
            })
            .collect()
    }

    /// Number of stored predictions.
    pub fn prediction_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .connection
            .query_row("SELECT COUNT(*) FROM prediction", [], |row| row.get(0))
            .map_err(map_sql_error)?;
        Ok(count.max(0) as u64)
    }

    /// Stored feature vector of an image, if any.
    pub fn feature_vector(&self, image: &ImageId) -> Result<Option<Vec<u8>>, StoreError> {
        self.connection
            .query_row(
                "SELECT fvec FROM image_feature WHERE image_id = ?1",
                params![image.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.connection
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sql_error)
    }

    fn query_states(&self, sql: &str, library: &ModelLibrary) -> Result<Vec<ModelState>, StoreError> {
        let mut stmt = self.connection.prepare(sql).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(params![library.as_str()], read_state_row)
            .map_err(map_sql_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(map_sql_error)?;
        rows.into_iter().map(RawState::into_state).collect()
    }
}

struct RawState {
    id: String,
    created_at: i64,
    partial: bool,
    model_library: String,
    criterion_library: Option<String>,
    stats: Option<String>,
    state_dict: Vec<u8>,
}

impl RawState {
    fn into_state(self) -> Result<ModelState, StoreError> {
        Ok(ModelState {
            id: parse_state_id(&self.id)?,
            created_at: self.created_at,
            partial: self.partial,
            model_library: ModelLibrary::new(self.model_library),
            criterion_library: self.criterion_library,
            stats: decode_stats(self.stats)?,
            state_dict: self.state_dict,
        })
    }
}

fn read_state_row(row: &Row<'_>) -> rusqlite::Result<RawState> {
    Ok(RawState {
        id: row.get(0)?,
        created_at: row.get(1)?,
        partial: row.get::<_, i64>(2)? != 0,
        model_library: row.get(3)?,
        criterion_library: row.get(4)?,
        stats: row.get(5)?,
        state_dict: row.get(6)?,
    })
}

fn read_image_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: ImageId::new(row.get::<_, String>(0)?),
        filename: row.get(1)?,
        annotations: None,
    })
}

fn parse_prediction_type(column: &'static str, value: &str) -> Result<PredictionType, StoreError> {
    value.parse().map_err(|_| StoreError::CorruptRow {
        column,
        value: value.to_string(),
    })
}

/// Drop geometry fields that do not belong to `annotation_type`.
fn restrict_to_geometry(mut annotation: Annotation, annotation_type: PredictionType) -> Annotation {
    let (point, size, polygon, mask) = match annotation_type {
        PredictionType::Labels => (false, false, false, false),
        PredictionType::Points => (true, false, false, false),
        PredictionType::BoundingBoxes => (true, true, false, false),
        PredictionType::Polygons => (false, false, true, false),
        PredictionType::SegmentationMasks => (false, true, false, true),
    };
    if !point {
        annotation.x = None;
        annotation.y = None;
    }
    if !size {
        annotation.width = None;
        annotation.height = None;
    }
    if !polygon {
        annotation.coordinates = None;
    }
    if !mask {
        annotation.segmentation_mask = None;
    }
    annotation
}
