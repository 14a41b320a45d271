//! # Post-actions.
//!
//! A post-action runs after a task finishes, on the worker that ran it. It either
//! **spawns** children (the generator's tasks are submitted to the same runner and
//! inherit the parent's fan-out table) or **reports** (writes rows, notifies, counts).
//!
//! Spawn actions run only for succeeded tasks; report actions run for every finished task.

use std::fmt;
use std::sync::Arc;

use crate::error::PostActionError;
use crate::tasks::{BoxTask, Domain, TaskNode};

/// Child generator: yields the follow-up tasks of a finished parent.
pub type SpawnFn<D> =
    dyn Fn(&TaskNode<D>) -> Result<Vec<BoxTask<D>>, PostActionError> + Send + Sync + 'static;

/// Reporting action over a finished task.
pub type ReportFn<D> = dyn Fn(&TaskNode<D>) -> Result<(), PostActionError> + Send + Sync + 'static;

/// Callable invoked after a task finishes.
pub enum PostAction<D: Domain> {
    /// Produce child tasks.
    Spawn(Arc<SpawnFn<D>>),
    /// Side effect only.
    Report(Arc<ReportFn<D>>),
}

impl<D: Domain> PostAction<D> {
    /// Wraps a child generator.
    pub fn spawn<F>(f: F) -> Self
    where
        F: Fn(&TaskNode<D>) -> Result<Vec<BoxTask<D>>, PostActionError> + Send + Sync + 'static,
    {
        PostAction::Spawn(Arc::new(f))
    }

    /// Wraps a generator that only needs the parent's output.
    ///
    /// Nothing is spawned when the parent has no output.
    pub fn children<F>(f: F) -> Self
    where
        F: Fn(&D::Output) -> Vec<BoxTask<D>> + Send + Sync + 'static,
    {
        Self::spawn(move |node| Ok(node.output().map(&f).unwrap_or_default()))
    }

    /// Wraps a reporting action.
    pub fn report<F>(f: F) -> Self
    where
        F: Fn(&TaskNode<D>) -> Result<(), PostActionError> + Send + Sync + 'static,
    {
        PostAction::Report(Arc::new(f))
    }

    /// True for [`PostAction::Spawn`].
    pub fn is_spawn(&self) -> bool {
        matches!(self, PostAction::Spawn(_))
    }
}

impl<D: Domain> Clone for PostAction<D> {
    fn clone(&self) -> Self {
        match self {
            PostAction::Spawn(f) => PostAction::Spawn(Arc::clone(f)),
            PostAction::Report(f) => PostAction::Report(Arc::clone(f)),
        }
    }
}

impl<D: Domain> fmt::Debug for PostAction<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PostAction::Spawn(_) => "PostAction::Spawn",
            PostAction::Report(_) => "PostAction::Report",
        })
    }
}
