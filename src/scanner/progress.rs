use tracing::debug;

use crate::model::RecordKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A parse task was spawned.
    Queued(RecordKind),
    /// A parse task produced a record.
    Parsed(RecordKind),
}

/// Receives progress events from the navigation thread and parse tasks.
pub trait ProgressSink: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Sink that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, event: ProgressEvent) {
        debug!(?event, "Progress");
    }
}
