//! # Event bus for runtime events.
//!
//! [`Bus`] stamps each [`Event`] with the runner's next sequence number and hands it to
//! every registered [`Subscribe`] implementor, synchronously, on the publishing thread.
//!
//! ## Architecture
//! ```text
//! Publishers (many threads):
//!   worker 0 ──┐
//!   worker 1 ──┼──► Bus::publish ──► seq += 1 ──► sub1.on_event(&ev)
//!   caller   ──┘                              ├─► sub2.on_event(&ev)
//!                                             └─► subN.on_event(&ev)
//! ```
//!
//! ## Rules
//! - Sequence numbers are owned by the bus (one per runner), never process-wide.
//! - A panicking subscriber is isolated: the panic is caught, logged, and reported to the
//!   other subscribers as [`EventKind::SubscriberPanicked`].
//! - Subscribers run on worker threads and should return quickly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::event::{Event, EventKind};
use crate::error::panic_message;
use crate::subscribers::Subscribe;

/// Synchronous fan-out of events to subscribers.
///
/// Cheap to clone (shares the counter and subscriber list).
#[derive(Clone, Default)]
pub struct Bus {
    seq: Arc<AtomicU64>,
    subs: Arc<[Arc<dyn Subscribe>]>,
}

impl Bus {
    /// Creates a bus delivering to `subs`.
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        Self {
            seq: Arc::new(AtomicU64::new(0)),
            subs: subs.into(),
        }
    }

    /// Assigns the next sequence number and delivers the event to every subscriber.
    pub fn publish(&self, mut ev: Event) {
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        if self.subs.is_empty() {
            return;
        }
        for (i, sub) in self.subs.iter().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(&ev))) {
                let info = panic_message(payload.as_ref());
                tracing::error!(subscriber = sub.name(), %info, "subscriber panicked");
                self.report_panic(i, sub.name(), info);
            }
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// True if nobody listens.
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Tells every subscriber except the panicking one; their own panics are dropped.
    fn report_panic(&self, culprit: usize, name: &'static str, info: String) {
        let mut ev = Event::new(EventKind::SubscriberPanicked)
            .with_label(name)
            .with_reason(info);
        ev.seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;

        for (i, sub) in self.subs.iter().enumerate() {
            if i != culprit {
                let _ = panic::catch_unwind(AssertUnwindSafe(|| sub.on_event(&ev)));
            }
        }
    }
}
