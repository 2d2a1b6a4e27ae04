//! Capability contracts for pluggable models and active-learning criteria.
//!
//! `train` and `inference` are mandatory. Updating a model to new label
//! classes and fusing partial states are optional capabilities exposed through
//! accessor methods returning `None` by default; the orchestrator probes them
//! once per operation.

use std::collections::BTreeMap;

use ndarray::Array2;
use thiserror::Error;

use crate::metadata::ProjectData;
use crate::progress::ProgressReporter;
use crate::records::{ImageId, StateStats};

/// Built-in active-learning criteria.
pub mod criteria;

pub use criteria::{BreakingTies, MaxConfidence};

/// Errors raised by model and ranker implementations.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The implementation failed with a plain message.
    #[error("{0}")]
    Message(String),
    /// The requested capability is not provided by this implementation.
    #[error("{0} is not supported by this model")]
    Unsupported(&'static str),
    /// Any other error raised by the implementation.
    #[error(transparent)]
    Source(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<String> for AdapterError {
    fn from(message: String) -> Self {
        AdapterError::Message(message)
    }
}

impl From<&str> for AdapterError {
    fn from(message: &str) -> Self {
        AdapterError::Message(message.to_string())
    }
}

/// Result of a training call: the new serialized state plus optional statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainOutput {
    pub state_dict: Vec<u8>,
    pub stats: Option<StateStats>,
}

impl From<Vec<u8>> for TrainOutput {
    fn from(state_dict: Vec<u8>) -> Self {
        Self {
            state_dict,
            stats: None,
        }
    }
}

/// A single raw model prediction before projection into storage columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPrediction {
    pub label: Option<String>,
    pub confidence: Option<f64>,
    pub priority: Option<f64>,
    /// Per-class scores, used by ranking criteria.
    pub logits: Option<Vec<f64>>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub coordinates: Option<Vec<f64>>,
    /// Per-pixel label indices of a segmentation mask (rows × columns).
    pub mask: Option<Array2<u8>>,
}

/// Inference output for one image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageInference {
    pub predictions: Vec<RawPrediction>,
    /// Optional serialized feature vector of the image.
    pub feature_vector: Option<Vec<u8>>,
}

/// Inference output keyed by image id.
pub type InferenceResults = BTreeMap<ImageId, ImageInference>;

/// A trainable model.
pub trait ModelAdapter {
    /// Train from `state` (`None` for a fresh model) on the annotated images in `data`.
    fn train(
        &self,
        state: Option<&[u8]>,
        data: &ProjectData,
        progress: &ProgressReporter<'_>,
    ) -> Result<TrainOutput, AdapterError>;

    /// Predict on the images in `data`.
    fn inference(
        &self,
        state: Option<&[u8]>,
        data: &ProjectData,
        progress: &ProgressReporter<'_>,
    ) -> Result<InferenceResults, AdapterError>;

    /// Capability to adapt a state to newly added label classes.
    fn updater(&self) -> Option<&dyn ModelUpdater> {
        None
    }

    /// Capability to fuse partial states trained by separate workers.
    fn averager(&self) -> Option<&dyn StateAverager> {
        None
    }
}

/// Adapts a model state to the current set of label classes.
pub trait ModelUpdater {
    fn update_model(
        &self,
        state: Option<&[u8]>,
        data: &ProjectData,
        progress: &ProgressReporter<'_>,
    ) -> Result<Vec<u8>, AdapterError>;
}

/// Fuses several partial model states into one.
pub trait StateAverager {
    fn average_model_states(
        &self,
        states: &[&[u8]],
        progress: &ProgressReporter<'_>,
    ) -> Result<Vec<u8>, AdapterError>;
}

/// An active-learning criterion; exposes its ranking capability when available.
pub trait RankerAdapter {
    fn ranker(&self) -> Option<&dyn Ranker>;
}

/// Assigns review priorities to predictions.
pub trait Ranker {
    fn rank(
        &self,
        results: InferenceResults,
        state: Option<&[u8]>,
        progress: &ProgressReporter<'_>,
    ) -> Result<InferenceResults, AdapterError>;
}
