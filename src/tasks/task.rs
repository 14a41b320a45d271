//! # Task abstraction.
//!
//! This module defines the [`Domain`] trait, which bundles the types one task graph
//! agrees on, and the [`Task`] trait every unit of work implements.
//!
//! A task only describes **what** to do once: [`Task::exec`] gets the opaque context
//! (the remote API client) and returns an output or a [`TaskError`]. Attempt counting,
//! retries, timing and reporting live in [`TaskNode`](crate::TaskNode), which owns the task
//! while it is scheduled.
//!
//! # Example
//! ```
//! use std::fmt;
//! use taskgraph::{Domain, Param, Task, TaskError};
//!
//! struct Client;
//! impl Client {
//!     fn layers(&self, ws: &str) -> Result<Vec<String>, TaskError> {
//!         Ok(vec![format!("{ws}:roads")])
//!     }
//! }
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! enum Kind { ListLayers }
//!
//! impl fmt::Display for Kind {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
//!         f.write_str("list_layers")
//!     }
//! }
//!
//! struct Crawl;
//! impl Domain for Crawl {
//!     type Context = Client;
//!     type Kind = Kind;
//!     type Output = Vec<String>;
//! }
//!
//! struct ListLayers { workspace: String }
//!
//! impl Task<Crawl> for ListLayers {
//!     fn kind(&self) -> Kind { Kind::ListLayers }
//!
//!     fn params(&self) -> Vec<Param> {
//!         vec![Param::new("workspace", &self.workspace)]
//!     }
//!
//!     fn exec(&mut self, client: &Client) -> Result<Vec<String>, TaskError> {
//!         client.layers(&self.workspace)
//!     }
//! }
//! ```

use std::fmt;
use std::hash::Hash;

use serde::Serialize;

use crate::error::TaskError;
use crate::report::Warning;

/// Types shared by every task of one graph.
///
/// Implemented on a marker type; the runner, nodes and fan-out table are generic over it.
pub trait Domain: Send + Sync + 'static {
    /// Opaque collaborator handle passed to every [`Task::exec`]. The runner never inspects it.
    type Context: Send + Sync + 'static;
    /// Tag used by the fan-out table to pick follow-up actions.
    type Kind: Copy + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;
    /// Payload produced by a successful task.
    type Output: fmt::Debug + Send + 'static;
}

/// Owned, type-erased task.
pub type BoxTask<D> = Box<dyn Task<D>>;

/// One reportable key parameter of a task (e.g. `workspace=topp`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Param {
    /// Parameter name; stable per task kind.
    pub name: &'static str,
    /// Rendered value.
    pub value: String,
}

impl Param {
    /// Creates a parameter.
    pub fn new(name: &'static str, value: impl fmt::Display) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Unit of schedulable work.
///
/// ### Rules
/// - `exec` runs on exactly one worker thread at a time; `&mut self` is exclusive.
/// - `exec` may be called again after a transient failure; keep it idempotent.
/// - Return errors instead of panicking; a panic is caught and treated as permanent.
pub trait Task<D: Domain>: Send + 'static {
    /// Kind tag used for fan-out lookup and the report's category column.
    fn kind(&self) -> D::Kind;

    /// Key parameters identifying this task in logs and reports.
    fn params(&self) -> Vec<Param> {
        Vec::new()
    }

    /// Executes one attempt.
    fn exec(&mut self, ctx: &D::Context) -> Result<D::Output, TaskError>;

    /// Soft problems in an otherwise successful output (e.g. "layer is disabled").
    fn warnings(&self, _output: &D::Output) -> Vec<Warning> {
        Vec::new()
    }

    /// Renders the output for the report's result column.
    fn format_result(&self, output: &D::Output) -> String {
        format!("{output:?}")
    }

    /// Per-task attempt budget; `None` uses the runner's [`RetryPolicy`](crate::RetryPolicy).
    fn attempts(&self) -> Option<u32> {
        None
    }
}

impl<D: Domain> Task<D> for BoxTask<D> {
    fn kind(&self) -> D::Kind {
        (**self).kind()
    }

    fn params(&self) -> Vec<Param> {
        (**self).params()
    }

    fn exec(&mut self, ctx: &D::Context) -> Result<D::Output, TaskError> {
        (**self).exec(ctx)
    }

    fn warnings(&self, output: &D::Output) -> Vec<Warning> {
        (**self).warnings(output)
    }

    fn format_result(&self, output: &D::Output) -> String {
        (**self).format_result(output)
    }

    fn attempts(&self) -> Option<u32> {
        (**self).attempts()
    }
}
