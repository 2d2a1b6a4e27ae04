//! Staged progress reporting towards the external job tracker.
//!
//! A [`ProgressReporter`] is created per operation and handed to the model
//! adapter. It folds a running offset and an optional cumulative total into
//! every event so that epochs and inference chunks add up to one logical
//! scale, and it keeps `done`/`total` monotonic across the whole stream.

use std::cell::Cell;
use std::fmt;

use serde::Serialize;

mod sinks;

pub use sinks::{ChannelSink, NullSink, RecordingSink, TracingSink};

/// Pipeline stage of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Preparing,
    Running,
    Finalizing,
    Success,
    Failure,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Preparing => "PREPARING",
            Stage::Running => "RUNNING",
            Stage::Finalizing => "FINALIZING",
            Stage::Success => "SUCCESS",
            Stage::Failure => "FAILURE",
        }
    }

    /// True for SUCCESS and FAILURE.
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Success | Stage::Failure)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update as seen by the job tracker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub project: String,
    pub stage: Stage,
    pub done: u64,
    pub total: u64,
    pub message: Option<String>,
    pub epoch: Option<u32>,
}

/// Receiver of progress events. Implementations must not block or panic.
pub trait ProgressSink {
    fn publish(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent),
{
    fn publish(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Per-operation progress emitter passed explicitly into every operation and adapter call.
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    project: String,
    epoch: Option<u32>,
    num_epochs: Option<u32>,
    cumulative_total: Option<u64>,
    offset: Cell<u64>,
    done: Cell<u64>,
    total: Cell<u64>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, project: impl Into<String>) -> Self {
        Self {
            sink,
            project: project.into(),
            epoch: None,
            num_epochs: None,
            cumulative_total: None,
            offset: Cell::new(0),
            done: Cell::new(0),
            total: Cell::new(0),
        }
    }

    /// Tag events with the epoch; messages get an `[Epoch e/n]` prefix when `n > 1`.
    pub fn with_epoch(mut self, epoch: u32, num_epochs: u32) -> Self {
        self.epoch = Some(epoch);
        self.num_epochs = Some(num_epochs);
        self
    }

    /// Declare the total of the whole logical operation (e.g. all images over all chunks).
    pub fn with_cumulative_total(mut self, total: u64) -> Self {
        self.cumulative_total = Some(total);
        self.total.set(total);
        self
    }

    /// Shift subsequent `done`/`total` counts by `offset`.
    pub fn set_offset(&self, offset: u64) {
        self.offset.set(offset);
    }

    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// Emit a stage change or message without new counts.
    pub fn update(&self, stage: Stage, message: impl AsRef<str>) {
        self.emit(stage, message.as_ref());
    }

    /// Emit an event carrying `done` of `total` units of the current sub-stage.
    pub fn advance(&self, stage: Stage, message: impl AsRef<str>, done: u64, total: u64) {
        let offset = self.offset.get();
        let mut effective_total = total.saturating_add(offset);
        if let Some(cumulative) = self.cumulative_total {
            effective_total = effective_total.max(cumulative);
        }
        let effective_done = done.saturating_add(offset).min(effective_total);

        let done = self.done.get().max(effective_done);
        let total = self.total.get().max(effective_total).max(done);
        self.done.set(done);
        self.total.set(total);
        self.emit(stage, message.as_ref());
    }

    /// Move `done` up to `total`; used right before SUCCESS.
    pub fn complete(&self) {
        self.done.set(self.total.get());
    }

    fn emit(&self, stage: Stage, message: &str) {
        let mut combined = String::new();
        if let (Some(epoch), Some(num_epochs)) = (self.epoch, self.num_epochs)
            && num_epochs > 1
        {
            combined.push_str(&format!("[Epoch {epoch}/{num_epochs}] "));
        }
        combined.push_str(message);
        self.sink.publish(ProgressEvent {
            project: self.project.clone(),
            stage,
            done: self.done.get(),
            total: self.total.get(),
            message: (!combined.is_empty()).then_some(combined),
            epoch: self.epoch,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(sink: &RecordingSink) -> Vec<(u64, u64)> {
        sink.events().iter().map(|e| (e.done, e.total)).collect()
    }

    #[test]
    fn offset_and_cumulative_total_compose_into_one_scale() {
        let sink = RecordingSink::default();
        let reporter = ProgressReporter::new(&sink, "p").with_cumulative_total(10);
        reporter.advance(Stage::Running, "chunk 1", 2, 4);
        reporter.set_offset(4);
        reporter.advance(Stage::Running, "chunk 2", 1, 4);
        reporter.set_offset(8);
        reporter.advance(Stage::Running, "chunk 3", 2, 2);
        assert_eq!(counts(&sink), vec![(2, 10), (5, 10), (10, 10)]);
    }

    #[test]
    fn done_never_exceeds_total_nor_decreases() {
        let sink = RecordingSink::default();
        let reporter = ProgressReporter::new(&sink, "p");
        reporter.advance(Stage::Running, "", 7, 5);
        reporter.advance(Stage::Running, "", 3, 5);
        reporter.advance(Stage::Running, "", 4, 3);
        let events = counts(&sink);
        assert_eq!(events, vec![(5, 5), (5, 5), (5, 5)]);
    }

    #[test]
    fn epoch_prefix_only_for_multi_epoch_runs() {
        let sink = RecordingSink::default();
        ProgressReporter::new(&sink, "p")
            .with_epoch(2, 5)
            .update(Stage::Preparing, "loading model state");
        ProgressReporter::new(&sink, "p")
            .with_epoch(1, 1)
            .update(Stage::Preparing, "loading model state");
        let messages: Vec<_> = sink.events().into_iter().map(|e| e.message).collect();
        assert_eq!(
            messages,
            vec![
                Some("[Epoch 2/5] loading model state".to_string()),
                Some("loading model state".to_string()),
            ]
        );
    }

    #[test]
    fn closures_act_as_sinks() {
        let seen = std::cell::RefCell::new(Vec::new());
        let sink = |event: ProgressEvent| seen.borrow_mut().push(event.stage);
        let reporter = ProgressReporter::new(&sink, "p");
        reporter.update(Stage::Preparing, "");
        reporter.update(Stage::Success, "done");
        assert_eq!(*seen.borrow(), vec![Stage::Preparing, Stage::Success]);
    }
}
