//! Fan-out: what happens after a task finishes.
//!
//! ## Contents
//! - [`PostAction`] spawn-children or report callable over a finished [`TaskNode`](crate::TaskNode)
//! - [`FanOut`] / [`FanOutBuilder`] kind → ordered actions lookup table
//!
//! The table holds no state and is safe to invoke from many workers at once.

mod action;
mod table;

pub use action::{PostAction, ReportFn, SpawnFn};
pub use table::{FanOut, FanOutBuilder};
