//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into one `tracing` record with structured fields.
//! Install a `tracing` subscriber (e.g. `tracing_subscriber::fmt`) to see the output.
//!
//! ## Levels
//! - `debug`: submitted, starting, succeeded
//! - `info`: retry rounds, shutdown
//! - `warn`: retry scheduled, post-action failures
//! - `error`: terminal task failures, worker/subscriber panics

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Subscribe for LogWriter {
    fn on_event(&self, e: &Event) {
        let task = e.label.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::TaskSubmitted => {
                tracing::debug!(seq = e.seq, task_id = ?e.task_id, parent = ?e.parent_id, task, "submitted");
            }
            EventKind::TaskStarting => {
                tracing::debug!(seq = e.seq, task_id = ?e.task_id, task, attempt = ?e.attempt, worker = ?e.worker, "starting");
            }
            EventKind::TaskSucceeded => {
                tracing::debug!(seq = e.seq, task_id = ?e.task_id, task, attempt = ?e.attempt, "succeeded");
            }
            EventKind::TaskFailed => {
                tracing::error!(seq = e.seq, task_id = ?e.task_id, task, attempt = ?e.attempt, err = reason, "failed");
            }
            EventKind::RetryScheduled => {
                tracing::warn!(seq = e.seq, task_id = ?e.task_id, task, attempt = ?e.attempt, err = reason, "retry scheduled");
            }
            EventKind::PostActionFailed => {
                tracing::warn!(seq = e.seq, task_id = ?e.task_id, task, err = reason, "post-action failed");
            }
            EventKind::RetryRound => {
                tracing::info!(seq = e.seq, round = ?e.attempt, delay_ms = ?e.delay_ms, tasks = ?e.count, "retry round");
            }
            EventKind::WorkerPanicked => {
                tracing::error!(seq = e.seq, worker = ?e.worker, info = reason, "worker recovered from panic");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, workers = ?e.count, "shutdown requested");
            }
            EventKind::AllStopped => {
                tracing::info!(seq = e.seq, "all workers stopped");
            }
            EventKind::SubscriberPanicked => {
                tracing::error!(seq = e.seq, subscriber = task, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
