//! # Runtime events emitted by the runner, workers and task nodes.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Task events**: submission, attempt start, success, terminal failure, retry scheduling
//! - **Runner events**: retry rounds, worker panics, shutdown
//! - **Subscriber events**: subscriber panics (isolated by the [`Bus`](super::Bus))
//!
//! ## Ordering guarantees
//! Each event gets a sequence number (`seq`) from the publishing runner's [`Bus`](super::Bus).
//! Sequence numbers are per runner, increase monotonically, and are assigned at publish time.
//!
//! ## Example
//! ```rust
//! use taskgraph::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::TaskFailed)
//!     .with_task(7, "layer")
//!     .with_reason("connection error: refused")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::TaskFailed);
//! assert_eq!(ev.task_id, Some(7));
//! assert_eq!(ev.label.as_deref(), Some("layer"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Task events ===
    /// Task was placed on the ready queue (root or child).
    ///
    /// Sets: `task_id`, `label`, `parent_id` (children only).
    TaskSubmitted,

    /// A worker is starting an attempt.
    ///
    /// Sets: `task_id`, `label`, `attempt` (1-based), `worker`.
    TaskStarting,

    /// Task's `exec` succeeded; post-actions follow.
    ///
    /// Sets: `task_id`, `label`, `attempt`.
    TaskSucceeded,

    /// Task failed terminally (permanent error or budget exhausted).
    ///
    /// Sets: `task_id`, `label`, `attempt`, `reason`.
    TaskFailed,

    /// Task failed transiently and was parked in the retry queue.
    ///
    /// Sets: `task_id`, `label`, `attempt`, `reason`.
    RetryScheduled,

    /// A post-action raised an error; the task outcome is unchanged.
    ///
    /// Sets: `task_id`, `label`, `reason`.
    PostActionFailed,

    // === Runner events ===
    /// The caller moved the retry queue back to ready after sleeping.
    ///
    /// Sets: `attempt` (round number, 1-based), `delay_ms`, `count`.
    RetryRound,

    /// A panic escaped a task run and was swallowed by the worker.
    ///
    /// Sets: `worker`, `reason`.
    WorkerPanicked,

    /// Both queues drained; stop sentinels are being sent.
    ///
    /// Sets: `count` (workers).
    ShutdownRequested,

    /// Every worker thread was joined.
    AllStopped,

    // === Subscriber events ===
    /// A subscriber panicked while handling an event.
    ///
    /// Sets: `label` (subscriber name), `reason`.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Per-runner sequence number, assigned by the bus on publish.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: DateTime<Utc>,
    /// Event classification.
    pub kind: EventKind,

    /// Node id (submission order within a runner).
    pub task_id: Option<u64>,
    /// Parent node id for fan-out children.
    pub parent_id: Option<u64>,
    /// Task kind label, or subscriber name.
    pub label: Option<Arc<str>>,
    /// Attempt number (1-based) or retry round.
    pub attempt: Option<u32>,
    /// Worker index.
    pub worker: Option<usize>,
    /// Delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Item count (retry batch size, worker count).
    pub count: Option<usize>,
    /// Human-readable reason (errors, panic payloads).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates an event of the given kind stamped with the current time.
    ///
    /// `seq` stays `0` until the event goes through [`Bus::publish`](super::Bus::publish).
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: Utc::now(),
            kind,
            task_id: None,
            parent_id: None,
            label: None,
            attempt: None,
            worker: None,
            delay_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches the node id and kind label.
    #[inline]
    pub fn with_task(mut self, id: u64, label: impl Into<Arc<str>>) -> Self {
        self.task_id = Some(id);
        self.label = Some(label.into());
        self
    }

    /// Attaches the parent node id.
    #[inline]
    pub fn with_parent(mut self, id: Option<u64>) -> Self {
        self.parent_id = id;
        self
    }

    /// Attaches a label without a task id (subscriber names).
    #[inline]
    pub fn with_label(mut self, label: impl Into<Arc<str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Attaches an attempt (or round) number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a worker index.
    #[inline]
    pub fn with_worker(mut self, index: usize) -> Self {
        self.worker = Some(index);
        self
    }

    /// Attaches a delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(d.as_millis().min(u128::from(u32::MAX)) as u32);
        self
    }

    /// Attaches an item count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_saturates() {
        let ev = Event::new(EventKind::RetryRound).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_new_event_is_unsequenced() {
        let ev = Event::new(EventKind::AllStopped);
        assert_eq!(ev.seq, 0);
        assert!(ev.task_id.is_none());
    }
}
