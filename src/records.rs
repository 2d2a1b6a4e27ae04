//! Rows and identifiers shared by the store, the loaders and the orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a committed model state row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(Uuid);

impl StateId {
    /// Allocate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing uuid.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Borrow the underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StateId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an image row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(String);

impl ImageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Name of the model implementation a state belongs to (e.g. `ai.models.pytorch.RetinaNet`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModelLibrary(String);

impl ModelLibrary {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Numeric training statistics attached to a model state (loss, mAP, ...).
pub type StateStats = BTreeMap<String, f64>;

/// A committed, immutable model checkpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelState {
    pub id: StateId,
    /// Creation time in unix microseconds.
    pub created_at: i64,
    pub partial: bool,
    pub model_library: ModelLibrary,
    pub criterion_library: Option<String>,
    pub stats: Option<StateStats>,
    /// Opaque serialized model weights.
    pub state_dict: Vec<u8>,
}

/// A model state that has not been committed yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewModelState {
    pub state_dict: Vec<u8>,
    pub stats: Option<StateStats>,
    pub partial: bool,
    pub model_library: ModelLibrary,
    pub criterion_library: Option<String>,
}

/// A label class as defined by project administrators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelClass {
    pub id: String,
    pub name: String,
    /// Position of the class in model outputs; only ever extended.
    pub index: i64,
    /// Creation time in unix microseconds.
    pub created_at: i64,
}

/// A user annotation; which geometry fields are set depends on the annotation type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    pub image: ImageId,
    pub label: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub coordinates: Option<Vec<f64>>,
    pub segmentation_mask: Option<String>,
}

/// Image metadata handed to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub filename: String,
    /// `None` when annotations were not requested.
    pub annotations: Option<Vec<Annotation>>,
}

/// Geometry family of annotations and predictions in a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PredictionType {
    Labels,
    Points,
    BoundingBoxes,
    Polygons,
    SegmentationMasks,
}

impl PredictionType {
    /// Stable identifier used in the settings table.
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionType::Labels => "labels",
            PredictionType::Points => "points",
            PredictionType::BoundingBoxes => "boundingBoxes",
            PredictionType::Polygons => "polygons",
            PredictionType::SegmentationMasks => "segmentationMasks",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown prediction type identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown prediction type: {0}")]
pub struct UnknownPredictionType(pub String);

impl FromStr for PredictionType {
    type Err = UnknownPredictionType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "labels" => Ok(PredictionType::Labels),
            "points" => Ok(PredictionType::Points),
            "boundingBoxes" => Ok(PredictionType::BoundingBoxes),
            "polygons" => Ok(PredictionType::Polygons),
            "segmentationMasks" => Ok(PredictionType::SegmentationMasks),
            other => Err(UnknownPredictionType(other.to_string())),
        }
    }
}

/// Project-wide settings the orchestrator consults.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub annotation_type: PredictionType,
    pub prediction_type: PredictionType,
    pub model_library: Option<ModelLibrary>,
    pub criterion_library: Option<String>,
}

/// A prediction in storage layout.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub image: ImageId,
    pub model_state: Option<StateId>,
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub priority: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub coordinates: Option<Vec<f64>>,
    /// Base64 of the row-major `u8` label array.
    pub segmentation_mask: Option<String>,
}

/// Per-image feature vector emitted during inference.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVectorRow {
    pub image: ImageId,
    pub vector: Vec<u8>,
}

/// Current time in unix microseconds.
pub fn now_micros() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_type_round_trips_through_identifier() {
        for kind in [
            PredictionType::Labels,
            PredictionType::Points,
            PredictionType::BoundingBoxes,
            PredictionType::Polygons,
            PredictionType::SegmentationMasks,
        ] {
            assert_eq!(kind.as_str().parse::<PredictionType>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_prediction_type_is_rejected() {
        let err = "ellipses".parse::<PredictionType>().unwrap_err();
        assert_eq!(err, UnknownPredictionType("ellipses".to_string()));
    }
}
