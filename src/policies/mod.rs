//! Retry policies.
//!
//! This module groups the knobs that control **whether** a failed task is tried again
//! and **how long** the runner pauses between retry rounds.
//!
//! ## Contents
//! - [`RetryPolicy`] attempt budget and whether success consumes it
//! - [`ErrorClassifier`] / [`SignatureClassifier`] transient vs. permanent failures
//! - [`BackoffPolicy`] pause between retry rounds (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization of that pause
//!
//! ## Quick wiring
//! ```text
//! RunnerConfig { retry: RetryPolicy, backoff: BackoffPolicy, .. }
//!      ├─► TaskNode::run uses retry + classifier to pick retry/terminal
//!      └─► Runner::wait_to_shutdown uses backoff.next(round) between rounds
//! ```

mod backoff;
mod classify;
mod jitter;
mod retry;

pub use backoff::BackoffPolicy;
pub use classify::{DEFAULT_PERMANENT_SIGNATURES, Disposition, ErrorClassifier, SignatureClassifier};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
