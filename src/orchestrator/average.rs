use std::collections::BTreeMap;

use super::{Operation, Orchestrator, OrchestratorError, finish};
use crate::adapter::{AdapterError, ModelAdapter};
use crate::progress::{ProgressReporter, ProgressSink, Stage};
use crate::records::{ModelLibrary, ModelState, NewModelState, StateId, StateStats};
use crate::store::ProjectRepository;

/// How [`Orchestrator::average_partial_states`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageOutcome {
    Averaged {
        state_id: StateId,
        /// Number of partial states fused into the new state.
        contributions: usize,
        /// Number of partial rows removed afterwards.
        purged: usize,
    },
    /// No partial state was pending; nothing was written.
    NothingToAverage,
}

/// Per-key mean over the stats of several states.
///
/// States missing a key do not count towards its mean and non-finite values
/// are ignored. Keys without any finite value are dropped; `None` when no key
/// survives.
pub fn average_stats<'a>(
    stats: impl IntoIterator<Item = Option<&'a StateStats>>,
) -> Option<StateStats> {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for entry in stats.into_iter().flatten() {
        for (key, value) in entry.iter().filter(|(_, value)| value.is_finite()) {
            let slot = sums.entry(key.as_str()).or_insert((0.0, 0));
            slot.0 += value;
            slot.1 += 1;
        }
    }
    let mean: StateStats = sums
        .into_iter()
        .map(|(key, (sum, count))| (key.to_string(), sum / count as f64))
        .collect();
    (!mean.is_empty()).then_some(mean)
}

impl<'r, R: ProjectRepository + ?Sized> Orchestrator<'r, R> {
    /// Fuse all partial states of `library` into one canonical state, then purge them.
    pub fn average_partial_states(
        &self,
        model: &dyn ModelAdapter,
        library: &ModelLibrary,
        epoch: u32,
        num_epochs: u32,
        sink: &dyn ProgressSink,
    ) -> Result<AverageOutcome, OrchestratorError> {
        let reporter = ProgressReporter::new(sink, self.repo.project()).with_epoch(epoch, num_epochs);
        let result = self.run_average(model, library, (epoch, num_epochs), &reporter);
        finish(&reporter, Operation::AverageStates, result)
    }

    fn run_average(
        &self,
        model: &dyn ModelAdapter,
        library: &ModelLibrary,
        epoch: (u32, u32),
        reporter: &ProgressReporter<'_>,
    ) -> Result<AverageOutcome, OrchestratorError> {
        let context = self.context(Operation::AverageStates, Some(epoch));

        reporter.update(Stage::Preparing, "loading model states");
        let partials = self
            .states
            .load_all_partial(library)
            .map_err(|source| OrchestratorError::StateLoad {
                context: context.clone(),
                stage: Stage::Preparing,
                source,
            })?;
        if partials.is_empty() {
            reporter.update(Stage::Success, "no model states to be averaged");
            return Ok(AverageOutcome::NothingToAverage);
        }

        reporter.update(Stage::Running, "averaging models");
        let averager = model
            .averager()
            .ok_or_else(|| OrchestratorError::AdapterExecution {
                context: context.clone(),
                stage: Stage::Running,
                action: "model state averaging",
                source: AdapterError::Unsupported("average_model_states"),
            })?;
        let dicts: Vec<&[u8]> = partials
            .iter()
            .map(|state| state.state_dict.as_slice())
            .collect();
        let state_dict = averager
            .average_model_states(&dicts, reporter)
            .map_err(|source| OrchestratorError::AdapterExecution {
                context: context.clone(),
                stage: Stage::Running,
                action: "model state averaging",
                source,
            })?;
        let stats = average_stats(partials.iter().map(|state| state.stats.as_ref()));

        reporter.update(Stage::Finalizing, "saving model state");
        let new_state = NewModelState {
            state_dict,
            stats,
            partial: false,
            model_library: partials[0].model_library.clone(),
            criterion_library: self.inherited_criterion_library(&partials),
        };
        let state_id = self
            .states
            .commit(&new_state)
            .map_err(|source| OrchestratorError::Commit {
                context: context.clone(),
                stage: Stage::Finalizing,
                what: "model state",
                source: source.into(),
            })?;

        reporter.update(Stage::Finalizing, "purging cache");
        let purged = self
            .states
            .purge_all_partial(library)
            .map_err(|source| OrchestratorError::Commit {
                context,
                stage: Stage::Finalizing,
                what: "partial state purge",
                source: source.into(),
            })?;

        reporter.complete();
        reporter.update(
            Stage::Success,
            format!("averaged {} model states", partials.len()),
        );
        Ok(AverageOutcome::Averaged {
            state_id,
            contributions: partials.len(),
            purged,
        })
    }

    fn inherited_criterion_library(&self, partials: &[ModelState]) -> Option<String> {
        partials
            .iter()
            .find_map(|state| state.criterion_library.clone())
            .or_else(|| self.settings_criterion_library())
    }
}
