//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging custom event handlers into the runner.
//!
//! ## Rules
//! - `on_event` runs on the publishing thread (a worker or the caller).
//! - Panics are caught by the bus and reported as `EventKind::SubscriberPanicked`.
//! - Keep it fast: a slow subscriber slows the worker that published.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use taskgraph::{Event, EventKind, Subscribe};
//!
//! #[derive(Default)]
//! struct Failures(AtomicUsize);
//!
//! impl Subscribe for Failures {
//!     fn on_event(&self, ev: &Event) {
//!         if ev.kind == EventKind::TaskFailed {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "failures" }
//! }
//! ```

use crate::events::Event;

/// Event subscriber for runtime observability.
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event.
    fn on_event(&self, event: &Event);

    /// Returns the subscriber name used in logs and panic events.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
