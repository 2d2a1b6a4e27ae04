use thiserror::Error;

use crate::adapter::AdapterError;
use crate::metadata::MetadataError;
use crate::progress::Stage;
use crate::projection::ProjectionError;
use crate::state_store::StateStoreError;

/// Stage-tagged failure of an orchestrated operation.
///
/// `context` names the project, operation and epoch (e.g. `[camtraps/train epoch 2/5]`);
/// the underlying failure stays reachable through [`std::error::Error::source`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("{context} {stage}: error during model state loading: {source}")]
    StateLoad {
        context: String,
        stage: Stage,
        source: StateStoreError,
    },
    #[error("{context} {stage}: error during metadata loading: {source}")]
    MetadataLoad {
        context: String,
        stage: Stage,
        source: MetadataError,
    },
    #[error("{context} {stage}: error during {action}: {source}")]
    AdapterExecution {
        context: String,
        stage: Stage,
        /// Adapter call that failed (`training`, `inference`, `ranking`, ...).
        action: &'static str,
        source: AdapterError,
    },
    #[error("{context} {stage}: error during result parsing: {source}")]
    InvalidResult {
        context: String,
        stage: Stage,
        source: ProjectionError,
    },
    #[error("{context} {stage}: error during data committing ({what}): {source}")]
    Commit {
        context: String,
        stage: Stage,
        /// What was being written.
        what: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("chunk {}/{chunks} failed: {source}", .index + 1)]
    ChunkProcessing {
        /// Zero-based index of the failing chunk.
        index: usize,
        chunks: usize,
        source: Box<OrchestratorError>,
    },
}

impl OrchestratorError {
    /// Pipeline stage the failure happened in.
    pub fn stage(&self) -> Stage {
        match self {
            OrchestratorError::StateLoad { stage, .. }
            | OrchestratorError::MetadataLoad { stage, .. }
            | OrchestratorError::AdapterExecution { stage, .. }
            | OrchestratorError::InvalidResult { stage, .. }
            | OrchestratorError::Commit { stage, .. } => *stage,
            OrchestratorError::ChunkProcessing { source, .. } => source.stage(),
        }
    }

    /// Index of the failing inference chunk, if the failure happened inside one.
    pub fn chunk_index(&self) -> Option<usize> {
        match self {
            OrchestratorError::ChunkProcessing { index, .. } => Some(*index),
            _ => None,
        }
    }
}
