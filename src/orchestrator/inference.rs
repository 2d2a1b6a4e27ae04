use super::{Operation, Orchestrator, OrchestratorError, finish};
use crate::adapter::{ModelAdapter, Ranker, RankerAdapter};
use crate::chunker::chunk_ids;
use crate::progress::{ProgressReporter, ProgressSink, Stage};
use crate::projection::project_image;
use crate::records::{ImageId, ModelLibrary, PredictionType, StateId};
use crate::store::ProjectRepository;

/// A batched inference request.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub library: ModelLibrary,
    pub image_ids: Vec<ImageId>,
    pub epoch: u32,
    pub num_epochs: u32,
    /// Maximum images per chunk; falls back to the orchestrator default.
    pub batch_size_limit: Option<usize>,
}

impl InferenceRequest {
    pub fn new(library: ModelLibrary, image_ids: Vec<ImageId>) -> Self {
        Self {
            library,
            image_ids,
            epoch: 1,
            num_epochs: 1,
            batch_size_limit: None,
        }
    }
}

/// Summary of a finished inference run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InferenceOutcome {
    /// State predictions were attributed to; `None` before the first training.
    pub state_id: Option<StateId>,
    /// Size of each processed chunk, in order.
    pub chunk_sizes: Vec<usize>,
    pub predictions: usize,
    pub feature_vectors: usize,
}

struct ChunkPlan<'a> {
    kind: PredictionType,
    state_id: Option<StateId>,
    state: Option<&'a [u8]>,
    ranker: Option<&'a dyn Ranker>,
    context: &'a str,
}

impl<'r, R: ProjectRepository + ?Sized> Orchestrator<'r, R> {
    /// Predict on `request.image_ids` chunk by chunk, ranking each chunk when a
    /// criterion with ranking capability is supplied.
    ///
    /// Each chunk is committed before the next one starts; a failing chunk
    /// aborts the run but leaves earlier chunks' predictions in place.
    pub fn infer_batched_with_ranking(
        &self,
        model: &dyn ModelAdapter,
        criterion: Option<&dyn RankerAdapter>,
        request: &InferenceRequest,
        sink: &dyn ProgressSink,
    ) -> Result<InferenceOutcome, OrchestratorError> {
        let reporter = ProgressReporter::new(sink, self.repo.project())
            .with_epoch(request.epoch, request.num_epochs)
            .with_cumulative_total(request.image_ids.len() as u64);
        tracing::info!(
            project = self.repo.project(),
            library = %request.library,
            images = request.image_ids.len(),
            ranking = criterion.is_some(),
            "Inference started"
        );
        let result = self.run_inference(model, criterion, request, &reporter);
        finish(&reporter, Operation::Inference, result)
    }

    fn run_inference(
        &self,
        model: &dyn ModelAdapter,
        criterion: Option<&dyn RankerAdapter>,
        request: &InferenceRequest,
        reporter: &ProgressReporter<'_>,
    ) -> Result<InferenceOutcome, OrchestratorError> {
        let context = self.context(Operation::Inference, Some((request.epoch, request.num_epochs)));

        reporter.update(Stage::Preparing, "loading project settings");
        let kind = self
            .repo
            .select_project_settings()
            .map_err(|source| OrchestratorError::MetadataLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source: source.into(),
            })?
            .prediction_type;

        reporter.update(Stage::Preparing, "loading model state");
        let state = self
            .states
            .load_latest(&request.library)
            .map_err(|source| OrchestratorError::StateLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;
        let ranker = criterion.and_then(|criterion| criterion.ranker());
        if criterion.is_some() && ranker.is_none() {
            tracing::warn!(
                project = self.repo.project(),
                "Criterion has no ranking capability; priorities default to confidence"
            );
        }

        let plan = ChunkPlan {
            kind,
            state_id: state.as_ref().map(|state| state.id),
            state: state.as_ref().map(|state| state.state_dict.as_slice()),
            ranker,
            context: &context,
        };
        let limit = request.batch_size_limit.or(self.default_batch_size_limit);
        let chunks = chunk_ids(&request.image_ids, limit);
        let mut outcome = InferenceOutcome {
            state_id: plan.state_id,
            ..InferenceOutcome::default()
        };
        let mut offset = 0u64;
        for (index, chunk) in chunks.iter().enumerate() {
            reporter.set_offset(offset);
            let (predictions, feature_vectors) = self
                .run_chunk(model, &plan, chunk, (index, chunks.len()), reporter)
                .map_err(|source| OrchestratorError::ChunkProcessing {
                    index,
                    chunks: chunks.len(),
                    source: Box::new(source),
                })?;
            outcome.chunk_sizes.push(chunk.len());
            outcome.predictions += predictions;
            outcome.feature_vectors += feature_vectors;
            offset += chunk.len() as u64;
        }

        reporter.complete();
        reporter.update(
            Stage::Success,
            format!("predicted on {} images", request.image_ids.len()),
        );
        tracing::info!(
            project = self.repo.project(),
            chunks = outcome.chunk_sizes.len(),
            predictions = outcome.predictions,
            "Inference finished"
        );
        Ok(outcome)
    }

    fn run_chunk(
        &self,
        model: &dyn ModelAdapter,
        plan: &ChunkPlan<'_>,
        chunk: &[ImageId],
        (index, count): (usize, usize),
        reporter: &ProgressReporter<'_>,
    ) -> Result<(usize, usize), OrchestratorError> {
        let label = format!("chunk {}/{count}", index + 1);

        reporter.update(Stage::Preparing, format!("loading metadata ({label})"));
        let data = self
            .metadata
            .load(chunk, false)
            .map_err(|source| OrchestratorError::MetadataLoad {
                context: plan.context.to_string(),
                stage: Stage::Preparing,
                source,
            })?;

        reporter.update(Stage::Running, format!("starting inference ({label})"));
        let mut results = model
            .inference(plan.state, &data, reporter)
            .map_err(|source| OrchestratorError::AdapterExecution {
                context: plan.context.to_string(),
                stage: Stage::Running,
                action: "inference",
                source,
            })?;

        if let Some(ranker) = plan.ranker {
            reporter.update(Stage::Running, format!("calculating priorities ({label})"));
            results = ranker
                .rank(results, plan.state, reporter)
                .map_err(|source| OrchestratorError::AdapterExecution {
                    context: plan.context.to_string(),
                    stage: Stage::Running,
                    action: "ranking",
                    source,
                })?;
        }

        reporter.update(Stage::Finalizing, format!("saving predictions ({label})"));
        let mut rows = Vec::new();
        let mut features = Vec::new();
        for (image, inference) in &results {
            let (image_rows, feature) = project_image(plan.kind, image, plan.state_id, inference)
                .map_err(|source| OrchestratorError::InvalidResult {
                    context: plan.context.to_string(),
                    stage: Stage::Finalizing,
                    source,
                })?;
            rows.extend(image_rows);
            features.extend(feature);
        }
        let inserted = self
            .repo
            .insert_predictions(&rows)
            .map_err(|source| OrchestratorError::Commit {
                context: plan.context.to_string(),
                stage: Stage::Finalizing,
                what: "predictions",
                source: source.into(),
            })?;
        let upserted = self
            .repo
            .upsert_image_feature_vectors(&features)
            .map_err(|source| OrchestratorError::Commit {
                context: plan.context.to_string(),
                stage: Stage::Finalizing,
                what: "feature vectors",
                source: source.into(),
            })?;

        let size = chunk.len() as u64;
        reporter.advance(Stage::Finalizing, format!("saved {label}"), size, size);
        tracing::debug!(
            project = self.repo.project(),
            chunk = index + 1,
            chunks = count,
            images = chunk.len(),
            predictions = inserted,
            feature_vectors = upserted,
            "Inference chunk committed"
        );
        Ok((inserted, upserted))
    }
}
