//! # Worker threads.
//!
//! Each worker is a named OS thread looping over the ready queue:
//!
//! ```text
//! loop {
//!   ready.pop() ──► Stop      ─► task_done, exit
//!               └─► Run(node) ─► catch_unwind(node.run) ─► task_done
//! }
//! ```
//!
//! A panic escaping `run` (node bookkeeping or a bug outside `exec`/post-actions) is
//! logged, published as [`EventKind::WorkerPanicked`] and swallowed. A node lost before
//! it was counted is recorded as failed and published as [`EventKind::TaskFailed`], so
//! the run summary still balances. The worker keeps serving the queue and `task_done` is
//! still called so the drain barrier cannot hang.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use crate::core::scheduler::{Message, Scheduler};
use crate::error::panic_message;
use crate::events::{Event, EventKind};
use crate::tasks::Domain;

/// Spawns worker `index` serving `sched`'s ready queue.
pub(crate) fn spawn<D: Domain>(
    sched: Scheduler<D>,
    index: usize,
    name: String,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name)
        .spawn(move || worker_loop(&sched, index))
}

fn worker_loop<D: Domain>(sched: &Scheduler<D>, index: usize) {
    tracing::debug!(worker = index, "worker started");
    loop {
        match sched.ready().pop() {
            Message::Stop => {
                sched.ready().task_done();
                break;
            }
            Message::Run(node) => {
                let task_id = node.id();
                let label: Arc<str> = Arc::from(node.label());
                let settled = node.settled();
                let run = panic::catch_unwind(AssertUnwindSafe(|| node.run(sched, index)));
                if let Err(payload) = run {
                    let info = panic_message(payload.as_ref());
                    tracing::error!(
                        worker = index,
                        task_id,
                        kind = %label,
                        %info,
                        "panic escaped task run"
                    );
                    if !settled.load(Ordering::Acquire) {
                        sched.record_failure();
                        sched.bus().publish(
                            Event::new(EventKind::TaskFailed)
                                .with_task(task_id, Arc::clone(&label))
                                .with_worker(index)
                                .with_reason(format!("task run panicked: {info}")),
                        );
                    }
                    sched.bus().publish(
                        Event::new(EventKind::WorkerPanicked)
                            .with_task(task_id, label)
                            .with_worker(index)
                            .with_reason(info),
                    );
                }
                sched.ready().task_done();
            }
        }
    }
    tracing::debug!(worker = index, "worker stopped");
}
