//! Reporting: rows, the shared sink and built-in writers.
//!
//! ## Contents
//! - [`ReportRow`], [`WarningRow`], [`Level`], [`Warning`] row data model
//! - [`ReportSink`] two-channel sink, one lock per row write (none with a single worker)
//! - [`RowWriter`] destination trait; [`JsonLinesWriter`], [`MemoryWriter`] built-ins
//!
//! ## Wiring
//! ```text
//! FanOut::builder().on_every(sink.action())
//!                       └─► node.report_row()   ─► ReportSink::write_report
//!                       └─► node.warning_rows() ─► ReportSink::write_warning
//! ```

mod row;
mod sink;
mod writers;

pub use row::{Level, ReportRow, Warning, WarningRow};
pub use sink::{ReportSink, RowWriter};
pub use writers::{JsonLinesWriter, MemoryWriter};
