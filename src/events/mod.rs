//! Runtime events: types and bus.
//!
//! This module groups the event **data model** and the **bus** used to deliver
//! runtime events emitted by the runner, its workers and task nodes.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] per-runner sequencing and synchronous fan-out to subscribers
//!
//! ## Quick reference
//! - **Publishers**: `Runner` (rounds, shutdown), workers (panics), `TaskNode` (lifecycle).
//! - **Consumers**: user [`Subscribe`](crate::Subscribe) implementors, e.g. `LogWriter`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
