//! # taskgraph
//!
//! **taskgraph** is a concurrent task-graph executor for crawling remote resource
//! hierarchies (workspace → store → layer → service probe) with a bounded pool of
//! OS worker threads.
//!
//! Finishing a task can spawn dependent tasks, so the graph is expanded lazily while it
//! runs. Failures are classified as transient or permanent; transient ones are retried
//! in rounds with bounded attempts. Results go through a synchronized reporting sink
//! shared by all workers.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐
//!     │  root task   │   │  root task   │        Runner::add_task
//!     └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ready queue (FIFO, task_done/join barrier)                       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  worker-0    │   │  worker-1    │   │  worker-N    │
//!     │ node.run()   │   │ node.run()   │   │ node.run()   │
//!     └┬────────┬────┘   └┬────────┬────┘   └┬────────┬────┘
//!      │        │         │        │         │        │
//!      │ Ok     │ Err     │        │         │        │
//!      ▼        ▼         ▼        ▼         ▼        ▼
//!   FanOut   classify ──► transient, budget left ──► retry queue
//!   actions     │                                      │
//!      │        └──► permanent / exhausted: Failed     │ next round
//!      │                                               ▼
//!      ├─► Spawn  ──► children ──► ready       wait_to_shutdown()
//!      └─► Report ──► ReportSink (one lock per row)
//! ```
//!
//! ### Lifecycle
//! ```text
//! Runner::builder(cfg, context) ─► add_task(..) ─► start() ─► wait_to_shutdown()
//!
//! wait_to_shutdown {
//!   ├─► ready.join()                         (children enqueued before parent's task_done)
//!   ├─► retry empty?  ─► yes: stop workers, return RunSummary
//!   └─► sleep backoff.next(round) ─► retry → ready ─► repeat
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                          |
//! |-------------------|-----------------------------------------------------------------|---------------------------------------------|
//! | **Tasks**         | Units of work over an opaque context.                           | [`Task`], [`TaskFn`], [`Domain`], [`Lookup`] |
//! | **Runner**        | Worker pool, retry rounds, drain and shutdown.                  | [`Runner`], [`RunnerConfig`], [`RunSummary`] |
//! | **Fan-out**       | Kind-keyed post-actions spawning children or reporting.         | [`FanOut`], [`PostAction`]                  |
//! | **Policies**      | Attempt budget, retry-round backoff, failure classification.    | [`RetryPolicy`], [`BackoffPolicy`], [`ErrorClassifier`] |
//! | **Reporting**     | Report and warning rows, locked per channel when D > 1.         | [`ReportSink`], [`RowWriter`], [`ReportRow`] |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).          | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed errors for the runtime, tasks, post-actions and sinks.    | [`TaskError`], [`RuntimeError`]             |
//!
//! ## Optional features
//! - `logging`: exports a built-in [`LogWriter`] rendering events through `tracing`.
//!
//! ## Example
//! ```rust
//! use std::fmt;
//! use std::sync::Arc;
//! use taskgraph::{Domain, FanOut, MemoryWriter, ReportRow, ReportSink, Runner,
//!                 RunnerConfig, Subscribe, TaskError, TaskFn, WarningRow};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Kind { Workspace, Layer }
//! impl fmt::Display for Kind {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str(match self { Kind::Workspace => "workspace", Kind::Layer => "layer" })
//!     }
//! }
//!
//! struct Crawl;
//! impl Domain for Crawl {
//!     type Context = ();
//!     type Kind = Kind;
//!     type Output = u32;
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let reports = MemoryWriter::<ReportRow>::new();
//!     let sink = ReportSink::new(reports.clone(), MemoryWriter::<WarningRow>::new());
//!
//!     let fan_out = FanOut::<Crawl>::builder()
//!         .children(Kind::Workspace, |layers: &u32| {
//!             (0..*layers)
//!                 .map(|i| TaskFn::<Crawl, _>::new(Kind::Layer, move |_: &()| Ok(i)).boxed())
//!                 .collect()
//!         })
//!         .on_every(sink.action())
//!         .build();
//!
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(taskgraph::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn Subscribe>> = Vec::new();
//!
//!     let mut runner = Runner::builder(RunnerConfig::default(), ())
//!         .with_fan_out(fan_out)
//!         .with_subscribers(subs)
//!         .build();
//!     runner.add_task(TaskFn::<Crawl, _>::new(Kind::Workspace, |_: &()| Ok::<_, TaskError>(3)));
//!     runner.start()?;
//!
//!     let summary = runner.wait_to_shutdown()?;
//!     assert_eq!(summary.submitted, 4);
//!     assert_eq!(reports.len(), 4);
//!     Ok(())
//! }
//! ```

mod core;
mod error;
mod events;
mod fanout;
mod policies;
mod report;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use core::{RunSummary, Runner, RunnerBuilder, RunnerConfig};
pub use error::{PostActionError, RuntimeError, SinkError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use fanout::{FanOut, FanOutBuilder, PostAction, ReportFn, SpawnFn};
pub use policies::{
    BackoffPolicy, DEFAULT_PERMANENT_SIGNATURES, Disposition, ErrorClassifier, JitterPolicy,
    RetryPolicy, SignatureClassifier,
};
pub use report::{
    JsonLinesWriter, Level, MemoryWriter, ReportRow, ReportSink, RowWriter, Warning, WarningRow,
};
pub use subscribers::Subscribe;
pub use tasks::{
    Attempt, BoxTask, Domain, Lookup, Outcome, Param, Task, TaskFn, TaskNode, TaskStatus,
};

// Optional: expose a simple built-in logger subscriber.
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
