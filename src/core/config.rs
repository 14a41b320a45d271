//! # Runner configuration.
//!
//! Provides [`RunnerConfig`], the settings of one [`Runner`](crate::Runner).
//!
//! ## Sentinel values
//! - `workers = 0` → clamped to a single worker
//! - `retry.attempts = 0` → clamped to a single try
//! - `thread_name` empty → `"taskgraph"`

use std::borrow::Cow;

use crate::policies::{BackoffPolicy, RetryPolicy};

/// Settings of a runner.
///
/// ## Field semantics
/// - `workers`: number of OS worker threads (degree of parallelism)
/// - `retry`: default attempt budget (tasks may override it)
/// - `backoff`: pause between retry rounds
/// - `thread_name`: prefix of worker thread names (`{prefix}-{index}`)
///
/// ## Notes
/// All fields are public. Prefer the accessors over sprinkling sentinel checks.
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Number of worker threads.
    pub workers: usize,

    /// Attempt budget applied to tasks that do not override it.
    pub retry: RetryPolicy,

    /// Delay the draining thread sleeps before each retry round.
    ///
    /// Round `n` (1-based) sleeps `backoff.next(n - 1)`.
    pub backoff: BackoffPolicy,

    /// Worker thread name prefix.
    pub thread_name: Cow<'static, str>,
}

impl RunnerConfig {
    /// Returns the worker count clamped to a minimum of 1.
    #[inline]
    pub fn workers_clamped(&self) -> usize {
        self.workers.max(1)
    }

    /// Returns the name of worker `index`.
    pub fn worker_name(&self, index: usize) -> String {
        let prefix = if self.thread_name.is_empty() {
            "taskgraph"
        } else {
            &self.thread_name
        };
        format!("{prefix}-{index}")
    }
}

impl Default for RunnerConfig {
    /// Default configuration:
    ///
    /// - `workers = 4`
    /// - `retry = RetryPolicy::default()` (3 tries, success consumes one)
    /// - `backoff = BackoffPolicy::default()` (constant 1s between rounds)
    /// - `thread_name = "taskgraph"`
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetryPolicy::default(),
            backoff: BackoffPolicy::default(),
            thread_name: Cow::Borrowed("taskgraph"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_workers_clamped() {
        let cfg = RunnerConfig {
            workers: 0,
            ..RunnerConfig::default()
        };
        assert_eq!(cfg.workers_clamped(), 1);
    }

    #[test]
    fn test_worker_names() {
        let mut cfg = RunnerConfig::default();
        assert_eq!(cfg.worker_name(2), "taskgraph-2");
        cfg.thread_name = "crawl".into();
        assert_eq!(cfg.worker_name(0), "crawl-0");
        cfg.thread_name = "".into();
        assert_eq!(cfg.worker_name(1), "taskgraph-1");
    }
}
