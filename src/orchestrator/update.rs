use super::{Operation, Orchestrator, OrchestratorError, finish};
use crate::adapter::ModelAdapter;
use crate::metadata::MetadataError;
use crate::progress::{ProgressReporter, ProgressSink, Stage};
use crate::records::{ModelLibrary, NewModelState, StateId};
use crate::store::ProjectRepository;

/// How [`Orchestrator::update_for_new_classes`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// A new canonical state was committed.
    Updated(StateId),
    /// No label class was added since the latest state.
    Unchanged,
    /// The model cannot adapt to new label classes.
    Unsupported,
}

impl<'r, R: ProjectRepository + ?Sized> Orchestrator<'r, R> {
    /// Adapt the latest state of `library` to label classes added after it.
    pub fn update_for_new_classes(
        &self,
        model: &dyn ModelAdapter,
        library: &ModelLibrary,
        sink: &dyn ProgressSink,
    ) -> Result<UpdateOutcome, OrchestratorError> {
        let reporter = ProgressReporter::new(sink, self.repo.project());
        let result = self.run_update(model, library, &reporter);
        finish(&reporter, Operation::UpdateModel, result)
    }

    fn run_update(
        &self,
        model: &dyn ModelAdapter,
        library: &ModelLibrary,
        reporter: &ProgressReporter<'_>,
    ) -> Result<UpdateOutcome, OrchestratorError> {
        let context = self.context(Operation::UpdateModel, None);

        reporter.update(Stage::Preparing, "checking for new label classes");
        let state = self
            .states
            .load_latest(library)
            .map_err(|source| OrchestratorError::StateLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;

        if let Some(latest) = &state {
            let added = self
                .repo
                .count_label_classes_since(latest.created_at)
                .map_err(|source| OrchestratorError::MetadataLoad {
                    context: context.clone(),
                    stage: Stage::Preparing,
                    source: MetadataError::from(source),
                })?;
            if added == 0 {
                reporter.update(
                    Stage::Success,
                    "class definitions unchanged; model did not need to be updated",
                );
                return Ok(UpdateOutcome::Unchanged);
            }
            tracing::info!(
                project = self.repo.project(),
                library = %library,
                added,
                "New label classes since latest model state"
            );
        }

        let Some(updater) = model.updater() else {
            tracing::warn!(
                project = self.repo.project(),
                library = %library,
                "Model does not support adaptation to new label classes"
            );
            reporter.update(
                Stage::Success,
                "model does not support adaptation to new label classes; not updated",
            );
            return Ok(UpdateOutcome::Unsupported);
        };

        reporter.update(Stage::Preparing, "loading metadata");
        let data = self
            .metadata
            .load_all(true)
            .map_err(|source| OrchestratorError::MetadataLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;

        reporter.update(Stage::Running, "updating model");
        let state_dict = updater
            .update_model(
                state.as_ref().map(|state| state.state_dict.as_slice()),
                &data,
                reporter,
            )
            .map_err(|source| OrchestratorError::AdapterExecution {
                context: context.clone(),
                stage: Stage::Running,
                action: "model update",
                source,
            })?;

        reporter.update(Stage::Finalizing, "saving model state");
        let new_state = NewModelState {
            state_dict,
            stats: None,
            partial: false,
            model_library: library.clone(),
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
        reporter.update(Stage::Success, "model updated to new label classes");
        Ok(UpdateOutcome::Updated(state_id))
    }
}
