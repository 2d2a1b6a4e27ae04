use super::{AdapterError, InferenceResults, Ranker, RankerAdapter, RawPrediction};
use crate::progress::ProgressReporter;

/// Ranks predictions by their highest class score.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaxConfidence;

impl RankerAdapter for MaxConfidence {
    fn ranker(&self) -> Option<&dyn Ranker> {
        Some(self)
    }
}

impl Ranker for MaxConfidence {
    fn rank(
        &self,
        results: InferenceResults,
        _state: Option<&[u8]>,
        _progress: &ProgressReporter<'_>,
    ) -> Result<InferenceResults, AdapterError> {
        Ok(map_predictions(results, |prediction| {
            prediction
                .logits
                .as_deref()
                .and_then(|logits| logits.iter().copied().reduce(f64::max))
                .or(prediction.confidence)
        }))
    }
}

/// Ranks predictions by how close the two best class scores are.
///
/// Priority is `1 - (p1 - p2)`, so near-ties get reviewed first. Predictions
/// with fewer than two scores keep their existing priority.
#[derive(Debug, Default, Clone, Copy)]
pub struct BreakingTies;

impl RankerAdapter for BreakingTies {
    fn ranker(&self) -> Option<&dyn Ranker> {
        Some(self)
    }
}

impl Ranker for BreakingTies {
    fn rank(
        &self,
        results: InferenceResults,
        _state: Option<&[u8]>,
        _progress: &ProgressReporter<'_>,
    ) -> Result<InferenceResults, AdapterError> {
        Ok(map_predictions(results, |prediction| {
            let Some(logits) = prediction.logits.as_deref() else {
                return prediction.priority;
            };
            let mut sorted: Vec<f64> = logits.iter().copied().filter(|v| v.is_finite()).collect();
            if sorted.len() < 2 {
                return prediction.priority;
            }
            sorted.sort_by(|a, b| b.total_cmp(a));
            Some(1.0 - (sorted[0] - sorted[1]))
        }))
    }
}

fn map_predictions(
    mut results: InferenceResults,
    priority: impl Fn(&RawPrediction) -> Option<f64>,
) -> InferenceResults {
    for image in results.values_mut() {
        for prediction in &mut image.predictions {
            prediction.priority = priority(prediction);
        }
    }
    results
}
