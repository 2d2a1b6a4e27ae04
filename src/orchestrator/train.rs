use super::{Operation, Orchestrator, OrchestratorError, finish};
use crate::adapter::ModelAdapter;
use crate::progress::{ProgressReporter, ProgressSink, Stage};
use crate::records::{ImageId, ModelLibrary, NewModelState, StateId};
use crate::store::ProjectRepository;

/// A training request for one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainRequest {
    pub library: ModelLibrary,
    pub image_ids: Vec<ImageId>,
    pub epoch: u32,
    pub num_epochs: u32,
    /// Train on a subset only; the result is committed as a partial state.
    pub subset: bool,
}

impl TrainRequest {
    pub fn new(library: ModelLibrary, image_ids: Vec<ImageId>) -> Self {
        Self {
            library,
            image_ids,
            epoch: 1,
            num_epochs: 1,
            subset: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainOutcome {
    pub state_id: StateId,
    pub partial: bool,
    /// Number of requested image ids.
    pub images: usize,
}

impl<'r, R: ProjectRepository + ?Sized> Orchestrator<'r, R> {
    /// Train `model` from the latest canonical state and commit the result.
    pub fn train(
        &self,
        model: &dyn ModelAdapter,
        request: &TrainRequest,
        sink: &dyn ProgressSink,
    ) -> Result<TrainOutcome, OrchestratorError> {
        let reporter = ProgressReporter::new(sink, self.repo.project())
            .with_epoch(request.epoch, request.num_epochs)
            .with_cumulative_total(request.image_ids.len() as u64);
        tracing::info!(
            project = self.repo.project(),
            library = %request.library,
            images = request.image_ids.len(),
            epoch = request.epoch,
            num_epochs = request.num_epochs,
            subset = request.subset,
            "Training started"
        );
        let result = self.run_train(model, request, &reporter);
        finish(&reporter, Operation::Train, result)
    }

    fn run_train(
        &self,
        model: &dyn ModelAdapter,
        request: &TrainRequest,
        reporter: &ProgressReporter<'_>,
    ) -> Result<TrainOutcome, OrchestratorError> {
        let context = self.context(Operation::Train, Some((request.epoch, request.num_epochs)));

        reporter.update(Stage::Preparing, "loading model state");
        let state = self
            .states
            .load_latest(&request.library)
            .map_err(|source| OrchestratorError::StateLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;

        reporter.update(Stage::Preparing, "loading metadata");
        let data = self
            .metadata
            .load(&request.image_ids, true)
            .map_err(|source| OrchestratorError::MetadataLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;

        reporter.update(Stage::Running, "initiating training");
        let output = model
            .train(
                state.as_ref().map(|state| state.state_dict.as_slice()),
                &data,
                reporter,
            )
            .map_err(|source| OrchestratorError::AdapterExecution {
                context: context.clone(),
                stage: Stage::Running,
                action: "training",
                source,
            })?;

        reporter.update(Stage::Finalizing, "saving model state");
        let new_state = NewModelState {
            state_dict: output.state_dict,
            stats: output.stats,
            partial: request.subset,
            model_library: request.library.clone(),
            criterion_library: self.settings_criterion_library(),
        };
        let state_id = self
            .states
            .commit(&new_state)
            .map_err(|source| OrchestratorError::Commit {
                context,
                stage: Stage::Finalizing,
                what: "model state",
                source: source.into(),
            })?;

        reporter.complete();
        reporter.update(
            Stage::Success,
            format!("trained on {} images", request.image_ids.len()),
        );
        tracing::info!(
            project = self.repo.project(),
            state_id = %state_id,
            partial = request.subset,
            "Training finished"
        );
        Ok(TrainOutcome {
            state_id,
            partial: request.subset,
            images: request.image_ids.len(),
        })
    }
}
