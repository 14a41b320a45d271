//! # Function-backed task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: FnMut(&Context) -> Result<Output, TaskError>` so small
//! tasks and fan-out children do not need a dedicated type.
//!
//! ## Example
//! ```rust
//! use std::fmt;
//! use taskgraph::{Domain, Task, TaskError, TaskFn};
//!
//! #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
//! struct Probe;
//! impl fmt::Display for Probe {
//!     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("probe") }
//! }
//!
//! struct Wms;
//! impl Domain for Wms {
//!     type Context = ();
//!     type Kind = Probe;
//!     type Output = u16;
//! }
//!
//! let t = TaskFn::<Wms, _>::new(Probe, |_ctx: &()| Ok::<_, TaskError>(200))
//!     .with_param("layer", "topp:states");
//!
//! assert_eq!(t.kind(), Probe);
//! assert_eq!(t.params()[0].to_string(), "layer=topp:states");
//! ```

use std::fmt;

use crate::error::TaskError;
use crate::report::Warning;
use crate::tasks::task::{BoxTask, Domain, Param, Task};

/// Function-backed task implementation.
pub struct TaskFn<D: Domain, F> {
    kind: D::Kind,
    params: Vec<Param>,
    attempts: Option<u32>,
    warn: Option<fn(&D::Output) -> Vec<Warning>>,
    f: F,
}

impl<D, F> TaskFn<D, F>
where
    D: Domain,
    F: FnMut(&D::Context) -> Result<D::Output, TaskError> + Send + 'static,
{
    /// Creates a new function-backed task of the given kind.
    pub fn new(kind: D::Kind, f: F) -> Self {
        Self {
            kind,
            params: Vec::new(),
            attempts: None,
            warn: None,
            f,
        }
    }

    /// Appends a reportable parameter.
    pub fn with_param(mut self, name: &'static str, value: impl fmt::Display) -> Self {
        self.params.push(Param::new(name, value));
        self
    }

    /// Overrides the attempt budget for this task.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Installs a hook flagging soft problems in a successful output.
    pub fn with_warnings(mut self, warn: fn(&D::Output) -> Vec<Warning>) -> Self {
        self.warn = Some(warn);
        self
    }

    /// Boxes the task for fan-out generators.
    pub fn boxed(self) -> BoxTask<D> {
        Box::new(self)
    }
}

impl<D, F> Task<D> for TaskFn<D, F>
where
    D: Domain,
    F: FnMut(&D::Context) -> Result<D::Output, TaskError> + Send + 'static,
{
    fn kind(&self) -> D::Kind {
        self.kind
    }

    fn params(&self) -> Vec<Param> {
        self.params.clone()
    }

    fn exec(&mut self, ctx: &D::Context) -> Result<D::Output, TaskError> {
        (self.f)(ctx)
    }

    fn warnings(&self, output: &D::Output) -> Vec<Warning> {
        self.warn.map(|w| w(output)).unwrap_or_default()
    }

    fn attempts(&self) -> Option<u32> {
        self.attempts
    }
}

impl<D: Domain, F> fmt::Debug for TaskFn<D, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskFn")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .field("attempts", &self.attempts)
            .finish_non_exhaustive()
    }
}
