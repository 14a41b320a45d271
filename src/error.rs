//! Error types used by the taskgraph runner, tasks, post-actions and sinks.
//!
//! This module defines four error enums:
//!
//! - [`RuntimeError`]: errors raised by the runner itself (lifecycle misuse, worker threads).
//! - [`TaskError`]: errors raised by individual task executions.
//! - [`PostActionError`]: errors raised by fan-out/report actions after a task finished.
//! - [`SinkError`]: errors raised by report row writers.
//!
//! All types provide `as_label` for logging/events. [`TaskError`] additionally exposes
//! [`TaskError::is_retryable`], the structural half of retry classification
//! (see [`ErrorClassifier`](crate::ErrorClassifier) for the configurable half).

use std::io;

use thiserror::Error;

/// # Errors produced by the runner.
///
/// These represent failures of the executor itself, never of a task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// `start()` was called on a runner whose workers are already running.
    #[error("runner already started")]
    AlreadyStarted,

    /// `wait_to_shutdown()` was called with pending tasks but no workers to run them.
    #[error("runner not started; {pending} task(s) pending")]
    NotStarted {
        /// Number of tasks waiting in the ready queue.
        pending: usize,
    },

    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker {index}: {source}")]
    WorkerSpawn {
        /// Zero-based worker index.
        index: usize,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A worker thread terminated by panic outside of task execution.
    #[error("worker thread '{name}' panicked")]
    WorkerPanicked {
        /// Thread name.
        name: String,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use taskgraph::RuntimeError;
    ///
    /// let err = RuntimeError::NotStarted { pending: 2 };
    /// assert_eq!(err.as_label(), "runtime_not_started");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::AlreadyStarted => "runtime_already_started",
            RuntimeError::NotStarted { .. } => "runtime_not_started",
            RuntimeError::WorkerSpawn { .. } => "runtime_worker_spawn",
            RuntimeError::WorkerPanicked { .. } => "runtime_worker_panicked",
        }
    }
}

/// # Errors produced by task execution.
///
/// Variants carry the structural part of the retry decision:
/// - [`TaskError::Connection`] is always retried while attempts remain;
/// - [`TaskError::NotFound`], [`TaskError::Fatal`] and [`TaskError::Panicked`] are never retried;
/// - [`TaskError::Fail`] is decided by the runner's classifier (message signatures).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Remote endpoint unreachable or not ready yet.
    #[error("connection error: {error}")]
    Connection {
        /// The underlying error message.
        error: String,
    },

    /// The collaborator reported the requested resource does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource.
        what: String,
    },

    /// Non-recoverable error (never retried).
    #[error("fatal error (no retry): {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },

    /// Execution failed; retried unless the message matches a permanent signature.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// `exec` panicked; the payload is rendered as text.
    #[error("task panicked: {info}")]
    Panicked {
        /// Panic payload.
        info: String,
    },
}

impl TaskError {
    /// Shorthand for [`TaskError::Connection`].
    pub fn connection(error: impl Into<String>) -> Self {
        TaskError::Connection {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::NotFound`].
    pub fn not_found(what: impl Into<String>) -> Self {
        TaskError::NotFound { what: what.into() }
    }

    /// Shorthand for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal {
            error: error.into(),
        }
    }

    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    ///
    /// # Example
    /// ```
    /// use taskgraph::TaskError;
    ///
    /// let err = TaskError::connection("refused");
    /// assert_eq!(err.as_label(), "task_connection");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Connection { .. } => "task_connection",
            TaskError::NotFound { .. } => "task_not_found",
            TaskError::Fatal { .. } => "task_fatal",
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
        }
    }

    /// Returns the bare message carried by the error (without the variant prefix).
    pub fn as_message(&self) -> &str {
        match self {
            TaskError::Connection { error }
            | TaskError::Fatal { error }
            | TaskError::Fail { error } => error,
            TaskError::NotFound { what } => what,
            TaskError::Panicked { info } => info,
        }
    }

    /// Indicates whether the error type is structurally safe to retry.
    ///
    /// Returns `true` for [`TaskError::Connection`] and [`TaskError::Fail`],
    /// `false` otherwise. A `Fail` may still be judged permanent by the classifier.
    ///
    /// # Example
    /// ```
    /// use taskgraph::TaskError;
    ///
    /// assert!(TaskError::fail("boom").is_retryable());
    /// assert!(!TaskError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Connection { .. } | TaskError::Fail { .. })
    }
}

/// # Errors produced by a post-action.
///
/// These never change the parent task's outcome; they are collected on the node and
/// surfaced as `Error` warning rows.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PostActionError {
    /// A child generator could not produce its tasks.
    #[error("spawn failed: {error}")]
    Spawn {
        /// The underlying error message.
        error: String,
    },

    /// A sink rejected a row.
    #[error("sink write failed: {error}")]
    Sink {
        /// The underlying error message.
        error: String,
    },

    /// The action panicked.
    #[error("post-action panicked: {info}")]
    Panicked {
        /// Panic payload.
        info: String,
    },
}

impl PostActionError {
    /// Shorthand for [`PostActionError::Spawn`].
    pub fn spawn(error: impl Into<String>) -> Self {
        PostActionError::Spawn {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            PostActionError::Spawn { .. } => "post_action_spawn",
            PostActionError::Sink { .. } => "post_action_sink",
            PostActionError::Panicked { .. } => "post_action_panicked",
        }
    }
}

impl From<SinkError> for PostActionError {
    fn from(err: SinkError) -> Self {
        PostActionError::Sink {
            error: err.to_string(),
        }
    }
}

/// # Errors produced by report row writers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// The underlying writer failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The row could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A direct (unlocked) channel was entered while another write was in progress.
    #[error("direct sink channel used by two writers at once")]
    Contended,
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs/events.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Io(_) => "sink_io",
            SinkError::Encode(_) => "sink_encode",
            SinkError::Contended => "sink_contended",
        }
    }
}

/// Renders a caught panic payload as text.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
