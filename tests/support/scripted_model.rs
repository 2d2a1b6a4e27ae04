use std::sync::Mutex;

use aiworker::adapter::{
    AdapterError, ImageInference, InferenceResults, ModelAdapter, ModelUpdater, RawPrediction,
    StateAverager, TrainOutput,
};
use aiworker::metadata::ProjectData;
use aiworker::progress::{ProgressReporter, Stage};
use aiworker::records::{ImageId, StateStats};

/// One observed adapter invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Train {
        state: Option<Vec<u8>>,
        images: Vec<ImageId>,
        annotations: usize,
    },
    Inference {
        state: Option<Vec<u8>>,
        images: Vec<ImageId>,
    },
    Update {
        state: Option<Vec<u8>>,
    },
    Average {
        states: Vec<Vec<u8>>,
    },
}

/// Deterministic model that records its calls and returns canned outputs.
pub struct ScriptedModel {
    pub calls: Mutex<Vec<Call>>,
    pub train_output: Vec<u8>,
    pub train_stats: Option<StateStats>,
    /// Template cloned for every image on inference.
    pub prediction: RawPrediction,
    pub feature_vector: Option<Vec<u8>>,
    /// 1-based inference call that fails.
    pub fail_inference_on: Option<usize>,
    pub supports_update: bool,
    pub supports_average: bool,
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            train_output: b"trained".to_vec(),
            train_stats: None,
            prediction: RawPrediction {
                label: Some("class-deer".to_string()),
                confidence: Some(0.75),
                x: Some(0.1),
                y: Some(0.2),
                width: Some(0.3),
                height: Some(0.4),
                ..RawPrediction::default()
            },
            feature_vector: None,
            fail_inference_on: None,
            supports_update: false,
            supports_average: false,
        }
    }
}

impl ScriptedModel {
    pub fn with_capabilities() -> Self {
        Self {
            supports_update: true,
            supports_average: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    fn record(&self, call: Call) -> usize {
        let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());
        calls.push(call);
        calls
            .iter()
            .filter(|call| matches!(call, Call::Inference { .. }))
            .count()
    }
}

fn ids(data: &ProjectData) -> Vec<ImageId> {
    data.images.iter().map(|image| image.id.clone()).collect()
}

impl ModelAdapter for ScriptedModel {
    fn train(
        &self,
        state: Option<&[u8]>,
        data: &ProjectData,
        progress: &ProgressReporter<'_>,
    ) -> Result<TrainOutput, AdapterError> {
        let total = data.images.len() as u64;
        for done in 1..=total {
            progress.advance(Stage::Running, "training", done, total);
        }
        self.record(Call::Train {
            state: state.map(<[u8]>::to_vec),
            images: ids(data),
            annotations: data.annotation_count(),
        });
        Ok(TrainOutput {
            state_dict: self.train_output.clone(),
            stats: self.train_stats.clone(),
        })
    }

    fn inference(
        &self,
        state: Option<&[u8]>,
        data: &ProjectData,
        progress: &ProgressReporter<'_>,
    ) -> Result<InferenceResults, AdapterError> {
        let call = self.record(Call::Inference {
            state: state.map(<[u8]>::to_vec),
            images: ids(data),
        });
        if self.fail_inference_on == Some(call) {
            return Err(AdapterError::from("scripted inference failure"));
        }
        let total = data.images.len() as u64;
        let mut results = InferenceResults::new();
        for (done, image) in data.images.iter().enumerate() {
            results.insert(
                image.id.clone(),
                ImageInference {
                    predictions: vec![self.prediction.clone()],
                    feature_vector: self.feature_vector.clone(),
                },
            );
            progress.advance(Stage::Running, "predicting", done as u64 + 1, total);
        }
        Ok(results)
    }

    fn updater(&self) -> Option<&dyn ModelUpdater> {
        self.supports_update.then_some(self as &dyn ModelUpdater)
    }

    fn averager(&self) -> Option<&dyn StateAverager> {
        self.supports_average.then_some(self as &dyn StateAverager)
    }
}

impl ModelUpdater for ScriptedModel {
    fn update_model(
        &self,
        state: Option<&[u8]>,
        _data: &ProjectData,
        _progress: &ProgressReporter<'_>,
    ) -> Result<Vec<u8>, AdapterError> {
        self.record(Call::Update {
            state: state.map(<[u8]>::to_vec),
        });
        let mut updated = state.map(<[u8]>::to_vec).unwrap_or_default();
        updated.extend_from_slice(b"+updated");
        Ok(updated)
    }
}

impl StateAverager for ScriptedModel {
    fn average_model_states(
        &self,
        states: &[&[u8]],
        _progress: &ProgressReporter<'_>,
    ) -> Result<Vec<u8>, AdapterError> {
        self.record(Call::Average {
            states: states.iter().map(|state| state.to_vec()).collect(),
        });
        Ok(states.concat())
    }
}
