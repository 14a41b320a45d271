//! # Serialized reporting sink.
//!
//! Post-actions of different finished tasks run concurrently on different workers.
//! [`ReportSink`] is the one place they meet. With more than one worker each channel's
//! writer sits behind its own mutex, and the lock is held for exactly one row write.
//!
//! ```text
//! worker 0 ─ report action ─┐        ┌─ lock ─ write one ReportRow ─ unlock
//! worker 1 ─ report action ─┼──────► │
//! worker 2 ─ report action ─┘        └─ lock ─ write one WarningRow ─ unlock
//! ```
//!
//! With a single worker every post-action runs sequentially on that thread, so no lock
//! is taken: [`ReportSink::for_workers`] with `1` (or [`ReportSink::direct`]) writes in
//! place. A direct channel only raises a flag while writing; overlapping use is
//! rejected with [`SinkError::Contended`] instead of waiting.

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{PostActionError, SinkError};
use crate::fanout::PostAction;
use crate::report::row::{ReportRow, WarningRow};
use crate::tasks::Domain;

/// Destination for one channel of rows.
pub trait RowWriter<R>: Send + 'static {
    /// Writes one complete row.
    fn write_row(&mut self, row: &R) -> Result<(), SinkError>;

    /// Flushes buffered rows.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

type BoxWriter<R> = Box<dyn RowWriter<R>>;

/// One channel's writer and how it is guarded.
enum Channel<R> {
    Locked(Mutex<BoxWriter<R>>),
    Direct(Exclusive<R>),
}

impl<R> Channel<R> {
    fn new(writer: BoxWriter<R>, synchronized: bool) -> Self {
        if synchronized {
            Channel::Locked(Mutex::new(writer))
        } else {
            Channel::Direct(Exclusive::new(writer))
        }
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut BoxWriter<R>) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        match self {
            Channel::Locked(writer) => f(&mut *writer.lock()),
            Channel::Direct(writer) => writer.with(f),
        }
    }
}

/// Writer used in place by a single thread.
struct Exclusive<R> {
    busy: AtomicBool,
    writer: UnsafeCell<BoxWriter<R>>,
}

// SAFETY: `writer` is only reached through `with`, which owns `busy` for the whole access,
// so at most one `&mut` exists at a time. The writer itself is `Send`.
unsafe impl<R> Sync for Exclusive<R> {}

/// Clears the busy flag, also when the writer panics.
struct Release<'a>(&'a AtomicBool);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R> Exclusive<R> {
    fn new(writer: BoxWriter<R>) -> Self {
        Self {
            busy: AtomicBool::new(false),
            writer: UnsafeCell::new(writer),
        }
    }

    fn with<T>(
        &self,
        f: impl FnOnce(&mut BoxWriter<R>) -> Result<T, SinkError>,
    ) -> Result<T, SinkError> {
        if self.busy.swap(true, Ordering::Acquire) {
            return Err(SinkError::Contended);
        }
        let _release = Release(&self.busy);
        // SAFETY: the flag was clear and is now ours until `_release` drops, so no other
        // reference to `writer` exists.
        f(unsafe { &mut *self.writer.get() })
    }
}

/// Two-channel sink shared by all workers.
pub struct ReportSink {
    report: Channel<ReportRow>,
    warnings: Channel<WarningRow>,
    report_rows: AtomicU64,
    warning_rows: AtomicU64,
}

impl ReportSink {
    /// Creates a sink writing report rows to `report` and warning rows to `warnings`.
    ///
    /// Both channels are locked, so any number of workers may share it.
    pub fn new(
        report: impl RowWriter<ReportRow>,
        warnings: impl RowWriter<WarningRow>,
    ) -> Arc<Self> {
        Self::build(Box::new(report), Box::new(warnings), true)
    }

    /// Creates a sink that writes without taking a lock. For single-worker runners.
    pub fn direct(
        report: impl RowWriter<ReportRow>,
        warnings: impl RowWriter<WarningRow>,
    ) -> Arc<Self> {
        Self::build(Box::new(report), Box::new(warnings), false)
    }

    /// Creates a sink for a runner with `workers` threads (see
    /// [`RunnerConfig::workers_clamped`](crate::RunnerConfig::workers_clamped)): locked
    /// when there is more than one, direct otherwise.
    pub fn for_workers(
        workers: usize,
        report: impl RowWriter<ReportRow>,
        warnings: impl RowWriter<WarningRow>,
    ) -> Arc<Self> {
        Self::build(Box::new(report), Box::new(warnings), workers > 1)
    }

    fn build(
        report: BoxWriter<ReportRow>,
        warnings: BoxWriter<WarningRow>,
        synchronized: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            report: Channel::new(report, synchronized),
            warnings: Channel::new(warnings, synchronized),
            report_rows: AtomicU64::new(0),
            warning_rows: AtomicU64::new(0),
        })
    }

    /// True if writes go through the per-channel mutex.
    pub fn is_synchronized(&self) -> bool {
        matches!(self.report, Channel::Locked(_))
    }

    /// Writes one report row.
    pub fn write_report(&self, row: &ReportRow) -> Result<(), SinkError> {
        self.report.with(|w| w.write_row(row))?;
        self.report_rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes one warning row.
    pub fn write_warning(&self, row: &WarningRow) -> Result<(), SinkError> {
        self.warnings.with(|w| w.write_row(row))?;
        self.warning_rows.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Flushes both channels.
    pub fn flush(&self) -> Result<(), SinkError> {
        self.report.with(|w| w.flush())?;
        self.warnings.with(|w| w.flush())
    }

    /// Report rows written so far.
    pub fn report_rows(&self) -> u64 {
        self.report_rows.load(Ordering::Relaxed)
    }

    /// Warning rows written so far.
    pub fn warning_rows(&self) -> u64 {
        self.warning_rows.load(Ordering::Relaxed)
    }

    /// Post-action writing the node's report row, then each of its warning rows.
    ///
    /// Every row is attempted; the first failure is returned.
    pub fn action<D: Domain>(self: &Arc<Self>) -> PostAction<D> {
        let sink = Arc::clone(self);
        PostAction::report(move |node| {
            let mut first: Option<PostActionError> = None;
            if let Err(e) = sink.write_report(&node.report_row()) {
                first.get_or_insert(e.into());
            }
            for row in node.warning_rows() {
                if let Err(e) = sink.write_warning(&row) {
                    first.get_or_insert(e.into());
                }
            }
            first.map_or(Ok(()), Err)
        })
    }
}
