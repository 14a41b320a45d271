//! Runtime core: worker pool, queues and lifecycle.
//!
//! The public API from this module is [`Runner`] (with [`RunnerBuilder`],
//! [`RunnerConfig`] and [`RunSummary`]).
//!
//! Internal modules:
//! - [`queue`]: blocking FIFO with the `task_done`/`join` barrier;
//! - [`scheduler`]: state shared by the runner, its workers and running nodes;
//! - [`worker`]: the worker thread loop;
//! - [`runner`]: submission, retry rounds and shutdown.

mod builder;
mod config;
mod queue;
mod runner;
mod scheduler;
mod worker;

pub use builder::RunnerBuilder;
pub use config::RunnerConfig;
pub use runner::{RunSummary, Runner};

#[cfg(test)]
pub(crate) use scheduler::Message;
pub(crate) use scheduler::Scheduler;
