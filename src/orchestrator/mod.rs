//! Per-project coordination of training, model update, state averaging and
//! batched inference.
//!
//! Every operation walks PREPARING → RUNNING → FINALIZING and ends with exactly
//! one terminal progress event: SUCCESS on the happy path, FAILURE carrying the
//! error message otherwise. Failures are returned as [`OrchestratorError`]
//! tagged with the stage they happened in.

mod average;
mod error;
mod inference;
mod train;
mod update;

use std::fmt;

pub use average::{AverageOutcome, average_stats};
pub use error::OrchestratorError;
pub use inference::{InferenceOutcome, InferenceRequest};
pub use train::{TrainOutcome, TrainRequest};
pub use update::UpdateOutcome;

use crate::metadata::MetadataLoader;
use crate::progress::{ProgressReporter, Stage};
use crate::state_store::ModelStateStore;
use crate::store::ProjectRepository;

/// Operation being orchestrated, used in error contexts and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Train,
    UpdateModel,
    AverageStates,
    Inference,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Train => "train",
            Operation::UpdateModel => "update_model",
            Operation::AverageStates => "average_model_states",
            Operation::Inference => "inference",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinates model operations of a single project.
pub struct Orchestrator<'r, R: ProjectRepository + ?Sized> {
    repo: &'r R,
    states: ModelStateStore<'r, R>,
    metadata: MetadataLoader<'r, R>,
    default_batch_size_limit: Option<usize>,
}

impl<'r, R: ProjectRepository + ?Sized> Orchestrator<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self {
            repo,
            states: ModelStateStore::new(repo),
            metadata: MetadataLoader::new(repo),
            default_batch_size_limit: None,
        }
    }

    /// Chunk size used by inference requests that do not carry their own limit.
    pub fn with_default_batch_size_limit(mut self, limit: Option<usize>) -> Self {
        self.default_batch_size_limit = limit.filter(|limit| *limit > 0);
        self
    }

    pub fn project(&self) -> &str {
        self.repo.project()
    }

    fn context(&self, operation: Operation, epoch: Option<(u32, u32)>) -> String {
        match epoch {
            Some((epoch, num_epochs)) => {
                format!("[{}/{operation} epoch {epoch}/{num_epochs}]", self.repo.project())
            }
            None => format!("[{}/{operation}]", self.repo.project()),
        }
    }

    /// Criterion library from the project settings; absent settings are not fatal here.
    fn settings_criterion_library(&self) -> Option<String> {
        match self.repo.select_project_settings() {
            Ok(settings) => settings.criterion_library,
            Err(err) => {
                tracing::warn!(
                    project = self.repo.project(),
                    error = %err,
                    "Could not read criterion library from project settings"
                );
                None
            }
        }
    }
}

/// Emit the terminal FAILURE event for `result` and pass it through.
fn finish<T>(
    reporter: &ProgressReporter<'_>,
    operation: Operation,
    result: Result<T, OrchestratorError>,
) -> Result<T, OrchestratorError> {
    if let Err(err) = &result {
        tracing::error!(
            operation = %operation,
            stage = %err.stage(),
            error = %err,
            "Operation failed"
        );
        reporter.update(Stage::Failure, err.to_string());
    }
    result
}
