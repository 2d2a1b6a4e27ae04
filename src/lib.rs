//! Active-learning worker core: per-project model state checkpoints, staged
//! progress reporting and orchestration of training, model updates, partial
//! state averaging and batched inference over pluggable models.

/// Model and ranking capability contracts.
pub mod adapter;
/// Application directory resolution.
pub mod app_dirs;
/// Inference request chunking.
pub mod chunker;
/// Worker configuration persisted as TOML.
pub mod config;
/// Tracing subscriber setup.
pub mod logging;
/// Label class, image and annotation loading.
pub mod metadata;
/// Operation pipelines.
pub mod orchestrator;
/// Progress events and sinks.
pub mod progress;
/// Projection of raw predictions into storage rows.
pub mod projection;
/// Shared record types.
pub mod records;
/// Worker startup and per-project wiring.
pub mod runtime;
/// Model state checkpoints.
pub mod state_store;
/// SQLite-backed project store.
pub mod store;

pub use orchestrator::{
    AverageOutcome, InferenceOutcome, InferenceRequest, Orchestrator, OrchestratorError,
    TrainOutcome, TrainRequest, UpdateOutcome,
};
pub use progress::{ProgressEvent, ProgressReporter, ProgressSink, Stage};
pub use runtime::Worker;
pub use store::{ProjectRepository, ProjectStore, StoreError};
