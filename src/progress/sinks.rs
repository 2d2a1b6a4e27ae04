use std::sync::Mutex;
use std::sync::mpsc::Sender;

use super::{ProgressEvent, ProgressSink, Stage};

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn publish(&self, event: ProgressEvent) {
        let message = event.message.as_deref().unwrap_or("");
        match event.stage {
            Stage::Failure => tracing::error!(
                project = %event.project,
                stage = %event.stage,
                done = event.done,
                total = event.total,
                epoch = ?event.epoch,
                "{message}"
            ),
            _ => tracing::info!(
                project = %event.project,
                stage = %event.stage,
                done = event.done,
                total = event.total,
                epoch = ?event.epoch,
                "{message}"
            ),
        }
    }
}

/// Forwards events to a channel drained by the broker bridge.
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<ProgressEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelSink {
    fn publish(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    /// Snapshot of the events seen so far.
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    /// The most recent event, if any.
    pub fn last(&self) -> Option<ProgressEvent> {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .last()
            .cloned()
    }
}

impl ProgressSink for RecordingSink {
    fn publish(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(event);
    }
}

/// Discards events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&self, _event: ProgressEvent) {}
}
