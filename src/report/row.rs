//! # Report and warning rows.
//!
//! Every finished node produces exactly one [`ReportRow`] and zero or more
//! [`WarningRow`]s. Rows are plain serializable data: the sink never sees nodes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity of a warning row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    /// Task succeeded but its output looks wrong.
    Warning,
    /// Task failed, or a post-action failed.
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

/// Soft problem flagged by [`Task::warnings`](crate::Task::warnings).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Warning {
    /// Severity.
    pub level: Level,
    /// Message shown in the warning channel.
    pub message: String,
}

impl Warning {
    /// A `Warning`-level entry.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            message: message.into(),
        }
    }

    /// An `Error`-level entry on an otherwise successful task.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }
}

/// One row of the structured report; one per finished task.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    /// Node id (submission order).
    pub id: u64,
    /// Parent node id for fan-out children.
    pub parent: Option<u64>,
    /// Kind label.
    pub kind: String,
    /// Key parameters rendered as `name=value` joined by `, `.
    pub params: String,
    /// `succeeded` / `failed` (or an in-flight status if written early).
    pub status: String,
    /// Tries made, including the last one.
    pub attempts: u32,
    /// Failed tries that were retried.
    pub retries: u32,
    /// Budget left after the last try.
    pub attempts_remaining: u32,
    /// Start of the last try.
    pub started_at: Option<DateTime<Utc>>,
    /// End of the last try.
    pub finished_at: Option<DateTime<Utc>>,
    /// `finished_at - started_at` in milliseconds.
    pub elapsed_ms: Option<i64>,
    /// Formatted output for succeeded tasks, empty otherwise.
    pub result: String,
    /// Terminal error followed by post-action errors.
    pub errors: Vec<String>,
}

impl ReportRow {
    /// Column names, in the order of [`ReportRow::fields`].
    pub const HEADER: [&'static str; 13] = [
        "id",
        "parent",
        "kind",
        "params",
        "status",
        "attempts",
        "retries",
        "attempts_remaining",
        "started_at",
        "finished_at",
        "elapsed_ms",
        "result",
        "errors",
    ];

    /// Renders the row as text cells aligned with [`ReportRow::HEADER`].
    pub fn fields(&self) -> [String; 13] {
        fn opt<T: ToString>(v: &Option<T>) -> String {
            v.as_ref().map(ToString::to_string).unwrap_or_default()
        }
        [
            self.id.to_string(),
            opt(&self.parent),
            self.kind.clone(),
            self.params.clone(),
            self.status.clone(),
            self.attempts.to_string(),
            self.retries.to_string(),
            self.attempts_remaining.to_string(),
            self.started_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.finished_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            opt(&self.elapsed_ms),
            self.result.clone(),
            self.errors.join(" | "),
        ]
    }
}

/// One row of the warning channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WarningRow {
    /// Node id.
    pub id: u64,
    /// Kind label.
    pub kind: String,
    /// Key parameters rendered as `name=value` joined by `, `.
    pub params: String,
    /// Severity.
    pub level: Level,
    /// Message.
    pub message: String,
}

impl WarningRow {
    /// Column names, in the order of [`WarningRow::fields`].
    pub const HEADER: [&'static str; 5] = ["id", "kind", "params", "level", "message"];

    /// Renders the row as text cells aligned with [`WarningRow::HEADER`].
    pub fn fields(&self) -> [String; 5] {
        [
            self.id.to_string(),
            self.kind.clone(),
            self.params.clone(),
            self.level.to_string(),
            self.message.clone(),
        ]
    }
}
