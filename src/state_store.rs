//! Model state checkpoints on top of the project repository.

use thiserror::Error;

use crate::records::{ModelLibrary, ModelState, NewModelState, StateId};
use crate::store::{ProjectRepository, StoreError};

/// Errors returned by the state store. Never retried at this layer.
#[derive(Debug, Error)]
pub enum StateStoreError {
    /// The backing store rejected or could not serve the request.
    #[error("Model state store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Append-only access to model states of one project.
pub struct ModelStateStore<'r, R: ProjectRepository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: ProjectRepository + ?Sized> ModelStateStore<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }

    /// Latest canonical state of `library`, or `None` before the first commit.
    pub fn load_latest(&self, library: &ModelLibrary) -> Result<Option<ModelState>, StateStoreError> {
        Ok(self.repo.select_latest_state(library)?)
    }

    pub fn load_all_partial(&self, library: &ModelLibrary) -> Result<Vec<ModelState>, StateStoreError> {
        Ok(self.repo.select_partial_states(library)?)
    }

    /// Insert a new state row and return its id.
    pub fn commit(&self, state: &NewModelState) -> Result<StateId, StateStoreError> {
        let (id, _) = self.repo.insert_state(state)?;
        tracing::debug!(
            project = self.repo.project(),
            library = %state.model_library,
            partial = state.partial,
            state_id = %id,
            "Committed model state"
        );
        Ok(id)
    }

    /// Delete every partial state of `library`.
    pub fn purge_all_partial(&self, library: &ModelLibrary) -> Result<usize, StateStoreError> {
        let removed = self.repo.delete_all_partial(library)?;
        tracing::debug!(
            project = self.repo.project(),
            library = %library,
            removed,
            "Purged partial model states"
        );
        Ok(removed)
    }
}
