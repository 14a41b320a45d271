//! # Tasks and the nodes that schedule them.
//!
//! This module provides the task-related types:
//! - [`Domain`] - the context/kind/output types one graph agrees on
//! - [`Task`] - trait every unit of work implements
//! - [`TaskFn`] - closure-backed task implementation
//! - [`BoxTask`] - owned, type-erased task (`Box<dyn Task<D>>`)
//! - [`Lookup`] - found / not found / error outcome at the collaborator boundary
//! - [`TaskNode`] - executor-side state machine wrapping a task

mod lookup;
mod node;
mod task;
mod task_fn;

pub use lookup::Lookup;
pub use node::{Attempt, Outcome, TaskNode, TaskStatus};
pub use task::{BoxTask, Domain, Param, Task};
pub use task_fn::TaskFn;
