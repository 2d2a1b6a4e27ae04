//! Projection of raw model predictions into the prediction table layout.
//!
//! Each prediction type owns an explicit column list; only those columns are
//! copied from the raw prediction. Segmentation masks are the special case:
//! the label array is base64 encoded and width/height come from its shape.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

use crate::adapter::{ImageInference, RawPrediction};
use crate::records::{FeatureVectorRow, ImageId, PredictionRow, PredictionType, StateId};

/// Storage column populated from a raw prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Label,
    Confidence,
    Priority,
    X,
    Y,
    Width,
    Height,
    Coordinates,
    SegmentationMask,
}

const LABEL_COLUMNS: &[Column] = &[Column::Label, Column::Confidence, Column::Priority];
const POINT_COLUMNS: &[Column] = &[
    Column::Label,
    Column::Confidence,
    Column::Priority,
    Column::X,
    Column::Y,
];
const BOUNDING_BOX_COLUMNS: &[Column] = &[
    Column::Label,
    Column::Confidence,
    Column::Priority,
    Column::X,
    Column::Y,
    Column::Width,
    Column::Height,
];
const POLYGON_COLUMNS: &[Column] = &[
    Column::Label,
    Column::Confidence,
    Column::Priority,
    Column::Coordinates,
];
const SEGMENTATION_COLUMNS: &[Column] = &[
    Column::SegmentationMask,
    Column::Width,
    Column::Height,
    Column::Priority,
];

/// Columns stored for predictions of `kind`.
pub fn columns(kind: PredictionType) -> &'static [Column] {
    match kind {
        PredictionType::Labels => LABEL_COLUMNS,
        PredictionType::Points => POINT_COLUMNS,
        PredictionType::BoundingBoxes => BOUNDING_BOX_COLUMNS,
        PredictionType::Polygons => POLYGON_COLUMNS,
        PredictionType::SegmentationMasks => SEGMENTATION_COLUMNS,
    }
}

/// Errors raised while projecting a raw prediction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// A segmentation prediction arrived without a label array.
    #[error("Segmentation prediction for image {0} has no label array")]
    MissingMask(ImageId),
}

/// Project one raw prediction of `image` into a storage row.
pub fn project_prediction(
    kind: PredictionType,
    image: &ImageId,
    model_state: Option<StateId>,
    raw: &RawPrediction,
) -> Result<PredictionRow, ProjectionError> {
    let mut row = PredictionRow {
        image: image.clone(),
        model_state,
        label: None,
        confidence: None,
        priority: None,
        x: None,
        y: None,
        width: None,
        height: None,
        coordinates: None,
        segmentation_mask: None,
    };
    let mask_shape = if kind == PredictionType::SegmentationMasks {
        let mask = raw
            .mask
            .as_ref()
            .ok_or_else(|| ProjectionError::MissingMask(image.clone()))?;
        let (height, width) = mask.dim();
        let flat: Vec<u8> = mask.iter().copied().collect();
        row.segmentation_mask = Some(BASE64.encode(flat));
        Some((width as f64, height as f64))
    } else {
        None
    };

    for column in columns(kind) {
        match column {
            Column::Label => row.label = raw.label.clone(),
            Column::Confidence => row.confidence = raw.confidence,
            Column::Priority => row.priority = raw.priority.or(raw.confidence),
            Column::X => row.x = raw.x,
            Column::Y => row.y = raw.y,
            Column::Width => row.width = mask_shape.map(|(w, _)| w).or(raw.width),
            Column::Height => row.height = mask_shape.map(|(_, h)| h).or(raw.height),
            Column::Coordinates => row.coordinates = raw.coordinates.clone(),
            Column::SegmentationMask => {}
        }
    }
    Ok(row)
}

/// Project every prediction and feature vector of one inference result.
pub fn project_image(
    kind: PredictionType,
    image: &ImageId,
    model_state: Option<StateId>,
    inference: &ImageInference,
) -> Result<(Vec<PredictionRow>, Option<FeatureVectorRow>), ProjectionError> {
    let rows = inference
        .predictions
        .iter()
        .map(|raw| project_prediction(kind, image, model_state, raw))
        .collect::<Result<Vec<_>, _>>()?;
    let feature = inference
        .feature_vector
        .as_ref()
        .filter(|vector| !vector.is_empty())
        .map(|vector| FeatureVectorRow {
            image: image.clone(),
            vector: vector.clone(),
        });
    Ok((rows, feature))
}
