//! # TaskNode: one scheduled task and its state machine.
//!
//! A [`TaskNode`] owns a user [`Task`] plus everything the runner tracks about it:
//! identity, timing, attempt budget, failed-attempt history and the final outcome.
//! A node lives in exactly one place at a time (the ready queue, a worker, or the retry
//! queue), so its state has a single writer by construction.
//!
//! ## Lifecycle
//! ```text
//!            submit                 worker pops
//! (created) ───────► Waiting ────────────────► Running
//!                                                │
//!            ┌───────────── exec Ok ─────────────┤
//!            ▼                                   │ exec Err
//!        Succeeded                               ▼
//!   (spawn + report actions)          classify + attempts -= 1
//!                                       │                 │
//!                        permanent or 0 left        transient, budget left
//!                                       ▼                 ▼
//!                                    Failed         AwaitingRetry ──► retry queue
//!                               (report actions)          │
//!                                                  next round: Running
//! ```
//!
//! ## Rules
//! - `Succeeded` and `Failed` are exclusive: the outcome is one enum value.
//! - Post-action errors never change the outcome; they are kept in a separate list.
//! - Failed tasks run report actions only; spawn actions need an output.
//! - `history` holds one entry per failed try that was retried and is never cleared.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use crate::core::Scheduler;
use crate::error::{PostActionError, TaskError, panic_message};
use crate::events::{Event, EventKind};
use crate::fanout::{FanOut, PostAction};
use crate::policies::Disposition;
use crate::report::{Level, ReportRow, WarningRow};
use crate::tasks::task::{BoxTask, Domain, Param};

/// Observable state of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Submitted, never started.
    Waiting,
    /// An attempt is executing.
    Running,
    /// Last attempt failed transiently; parked until the next retry round.
    AwaitingRetry,
    /// Terminal: `exec` returned an output.
    Succeeded,
    /// Terminal: permanent error or budget exhausted.
    Failed,
}

impl TaskStatus {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Running => "running",
            TaskStatus::AwaitingRetry => "awaiting_retry",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    /// True for `Succeeded` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of a node.
#[derive(Debug)]
pub enum Outcome<O> {
    /// `exec` returned this output.
    Succeeded(O),
    /// The last error, after which no retry was made.
    Failed(TaskError),
}

/// One failed try that was followed by a retry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// When the try started.
    pub started_at: DateTime<Utc>,
    /// When the try failed.
    pub finished_at: DateTime<Utc>,
    /// What it failed with.
    pub error: TaskError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempt {} at {}: {}",
            self.number,
            self.started_at.to_rfc3339(),
            self.error
        )
    }
}

/// Executor-side wrapper around a [`Task`](crate::Task).
pub struct TaskNode<D: Domain> {
    id: u64,
    parent: Option<u64>,
    task: BoxTask<D>,
    kind: D::Kind,
    label: Arc<str>,
    fan_out: Arc<FanOut<D>>,

    attempts_remaining: u32,
    history: Vec<Attempt>,
    awaiting_retry: bool,

    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    outcome: Option<Outcome<D::Output>>,
    post_action_errors: Vec<PostActionError>,
    settled: Arc<AtomicBool>,
}

impl<D: Domain> TaskNode<D> {
    pub(crate) fn new(
        id: u64,
        parent: Option<u64>,
        task: BoxTask<D>,
        fan_out: Arc<FanOut<D>>,
        attempts: u32,
    ) -> Self {
        let kind = task.kind();
        Self {
            id,
            parent,
            label: kind.to_string().into(),
            kind,
            task,
            fan_out,
            attempts_remaining: attempts,
            history: Vec::new(),
            awaiting_retry: false,
            started_at: None,
            finished_at: None,
            outcome: None,
            post_action_errors: Vec::new(),
            settled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs one attempt on the calling worker.
    ///
    /// On a transient failure with budget left the node moves itself to the retry
    /// queue; otherwise it finishes, runs its post-actions and is dropped.
    pub(crate) fn run(mut self: Box<Self>, sched: &Scheduler<D>, worker: usize) {
        let attempt = self.attempt_number();
        self.settled.store(false, Ordering::Release);
        self.awaiting_retry = false;
        self.finished_at = None;
        let started = Utc::now();
        self.started_at = Some(started);

        tracing::debug!(task_id = self.id, kind = %self.label, attempt, worker, "attempt starting");
        sched.bus().publish(
            self.event(EventKind::TaskStarting)
                .with_attempt(attempt)
                .with_worker(worker),
        );

        let ctx = sched.context();
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.task.exec(ctx)))
            .unwrap_or_else(|payload| {
                Err(TaskError::Panicked {
                    info: panic_message(payload.as_ref()),
                })
            });
        let now = Utc::now();

        match result {
            Ok(output) => {
                if sched.policy().success_consumes_attempt {
                    self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
                }
                self.finished_at = Some(now);
                self.outcome = Some(Outcome::Succeeded(output));
                sched.record_success();
                self.settled.store(true, Ordering::Release);

                tracing::info!(task_id = self.id, kind = %self.label, attempt, "task succeeded");
                sched
                    .bus()
                    .publish(self.event(EventKind::TaskSucceeded).with_attempt(attempt));
                self.post_actions(sched, true);
            }
            Err(err) => {
                self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
                let disposition = self.classify(sched, &err);
                if disposition == Disposition::Permanent {
                    self.attempts_remaining = 0;
                }

                if self.attempts_remaining == 0 {
                    self.finished_at = Some(now);
                    tracing::warn!(
                        task_id = self.id,
                        kind = %self.label,
                        attempt,
                        ?disposition,
                        error = %err,
                        "task failed"
                    );
                    sched.bus().publish(
                        self.event(EventKind::TaskFailed)
                            .with_attempt(attempt)
                            .with_reason(err.to_string()),
                    );
                    self.outcome = Some(Outcome::Failed(err));
                    sched.record_failure();
                    self.settled.store(true, Ordering::Release);
                    self.post_actions(sched, false);
                } else {
                    tracing::debug!(
                        task_id = self.id,
                        kind = %self.label,
                        attempt,
                        remaining = self.attempts_remaining,
                        error = %err,
                        "attempt failed, retry scheduled"
                    );
                    sched.bus().publish(
                        self.event(EventKind::RetryScheduled)
                            .with_attempt(attempt)
                            .with_reason(err.to_string()),
                    );
                    self.history.push(Attempt {
                        number: attempt,
                        started_at: started,
                        finished_at: now,
                        error: err,
                    });
                    self.awaiting_retry = true;
                    self.settled.store(true, Ordering::Release);
                    sched.requeue(self);
                }
            }
        }
    }

    /// Flag raised once the current run has been counted (succeeded, failed or parked).
    ///
    /// Lets the worker tell whether a panic escaping [`TaskNode::run`] lost an uncounted node.
    pub(crate) fn settled(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.settled)
    }

    /// Asks the runner's classifier about `err`.
    ///
    /// A panicking classifier makes the failure permanent.
    fn classify(&self, sched: &Scheduler<D>, err: &TaskError) -> Disposition {
        panic::catch_unwind(AssertUnwindSafe(|| sched.classifier().classify(err))).unwrap_or_else(
            |payload| {
                tracing::error!(
                    task_id = self.id,
                    kind = %self.label,
                    info = %panic_message(payload.as_ref()),
                    "error classifier panicked"
                );
                Disposition::Permanent
            },
        )
    }

    /// Runs every post-action for this kind, each one isolated from the others.
    fn post_actions(&mut self, sched: &Scheduler<D>, succeeded: bool) {
        let fan_out = Arc::clone(&self.fan_out);
        for action in fan_out.actions(self.kind) {
            let node: &Self = self;
            let caught = match action {
                PostAction::Spawn(_) if !succeeded => continue,
                PostAction::Spawn(generate) => panic::catch_unwind(AssertUnwindSafe(|| {
                    generate(node).map(|children| {
                        for child in children {
                            sched.submit(child, Arc::clone(&fan_out), Some(node.id));
                        }
                    })
                })),
                PostAction::Report(report) => {
                    panic::catch_unwind(AssertUnwindSafe(|| report(node)))
                }
            };

            let err = match caught {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(payload) => PostActionError::Panicked {
                    info: panic_message(payload.as_ref()),
                },
            };
            tracing::warn!(task_id = self.id, kind = %self.label, error = %err, "post-action failed");
            sched
                .bus()
                .publish(self.event(EventKind::PostActionFailed).with_reason(err.to_string()));
            self.post_action_errors.push(err);
        }
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_task(self.id, Arc::clone(&self.label))
            .with_parent(self.parent)
    }

    fn attempt_number(&self) -> u32 {
        u32::try_from(self.history.len())
            .unwrap_or(u32::MAX)
            .saturating_add(1)
    }

    /// Runner-local id, assigned in submission order starting at 1.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Id of the node whose fan-out spawned this one.
    pub fn parent(&self) -> Option<u64> {
        self.parent
    }

    /// Kind tag.
    pub fn kind(&self) -> D::Kind {
        self.kind
    }

    /// Kind rendered for logs and reports.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Key parameters of the wrapped task.
    pub fn params(&self) -> Vec<Param> {
        self.task.params()
    }

    /// Current state, derived from timing, outcome and the retry flag.
    pub fn status(&self) -> TaskStatus {
        match (&self.outcome, self.awaiting_retry, self.started_at) {
            (Some(Outcome::Succeeded(_)), ..) => TaskStatus::Succeeded,
            (Some(Outcome::Failed(_)), ..) => TaskStatus::Failed,
            (None, true, _) => TaskStatus::AwaitingRetry,
            (None, false, Some(_)) => TaskStatus::Running,
            (None, false, None) => TaskStatus::Waiting,
        }
    }

    /// True once an outcome is recorded.
    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Output of a succeeded node.
    pub fn output(&self) -> Option<&D::Output> {
        match &self.outcome {
            Some(Outcome::Succeeded(o)) => Some(o),
            _ => None,
        }
    }

    /// Terminal error of a failed node.
    pub fn failure(&self) -> Option<&TaskError> {
        match &self.outcome {
            Some(Outcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    /// Terminal outcome, if any.
    pub fn outcome(&self) -> Option<&Outcome<D::Output>> {
        self.outcome.as_ref()
    }

    /// Failed tries that were retried, oldest first.
    pub fn history(&self) -> &[Attempt] {
        &self.history
    }

    /// Tries left in the budget.
    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    /// Tries made so far, counting the current or last one.
    pub fn attempts_made(&self) -> u32 {
        if self.started_at.is_none() {
            return 0;
        }
        if self.awaiting_retry {
            return u32::try_from(self.history.len()).unwrap_or(u32::MAX);
        }
        self.attempt_number()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Duration of the last try, once it finished.
    pub fn elapsed(&self) -> Option<chrono::TimeDelta> {
        Some(self.finished_at? - self.started_at?)
    }

    /// Errors raised by post-actions so far.
    pub fn post_action_errors(&self) -> &[PostActionError] {
        &self.post_action_errors
    }

    fn params_text(&self) -> String {
        self.params()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Builds this node's report row.
    ///
    /// Post-action errors are included up to the moment the row is built, so errors
    /// from actions that run after the reporting one are not in it.
    pub fn report_row(&self) -> ReportRow {
        ReportRow {
            id: self.id,
            parent: self.parent,
            kind: self.label.to_string(),
            params: self.params_text(),
            status: self.status().to_string(),
            attempts: self.attempts_made(),
            retries: u32::try_from(self.history.len()).unwrap_or(u32::MAX),
            attempts_remaining: self.attempts_remaining,
            started_at: self.started_at,
            finished_at: self.finished_at,
            elapsed_ms: self.elapsed().map(|d| d.num_milliseconds()),
            result: self
                .output()
                .map(|o| self.task.format_result(o))
                .unwrap_or_default(),
            errors: self
                .failure()
                .map(ToString::to_string)
                .into_iter()
                .chain(self.post_action_errors.iter().map(ToString::to_string))
                .collect(),
        }
    }

    /// Builds this node's warning rows: output warnings, terminal failure, post-action errors.
    pub fn warning_rows(&self) -> Vec<WarningRow> {
        let params = self.params_text();
        let row = |level: Level, message: String| WarningRow {
            id: self.id,
            kind: self.label.to_string(),
            params: params.clone(),
            level,
            message,
        };

        let mut rows = Vec::new();
        match &self.outcome {
            Some(Outcome::Succeeded(output)) => {
                rows.extend(
                    self.task
                        .warnings(output)
                        .into_iter()
                        .map(|w| row(w.level, w.message)),
                );
            }
            Some(Outcome::Failed(err)) => {
                let mut message = format!("{err} (after {} attempt(s))", self.attempts_made());
                for attempt in &self.history {
                    message.push_str("; ");
                    message.push_str(&attempt.to_string());
                }
                rows.push(row(Level::Error, message));
            }
            None => {}
        }
        rows.extend(
            self.post_action_errors
                .iter()
                .map(|e| row(Level::Error, format!("post-action: {e}"))),
        );
        rows
    }
}

impl<D: Domain> fmt::Debug for TaskNode<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskNode")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("attempts_remaining", &self.attempts_remaining)
            .field("history", &self.history.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
struct Finished<D: Domain>(D::Kind);

#[cfg(test)]
impl<D: Domain> crate::tasks::Task<D> for Finished<D> {
    fn kind(&self) -> D::Kind {
        self.0
    }

    fn exec(&mut self, _ctx: &D::Context) -> Result<D::Output, TaskError> {
        Err(TaskError::fatal("already finished"))
    }
}

#[cfg(test)]
impl<D: Domain> TaskNode<D> {
    /// A node that already succeeded with `output`, for exercising post-actions alone.
    pub(crate) fn succeeded_for_test(kind: D::Kind, output: D::Output) -> Self {
        let mut node = Self::new(1, None, Box::new(Finished::<D>(kind)), FanOut::empty(), 1);
        let now = Utc::now();
        node.started_at = Some(now);
        node.finished_at = Some(now);
        node.outcome = Some(Outcome::Succeeded(output));
        node
    }
}
