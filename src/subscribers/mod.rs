//! # Event subscribers for the runner.
//!
//! This module provides the [`Subscribe`] trait and the built-in [`LogWriter`]
//! (behind the `logging` feature).
//!
//! ## Architecture
//! ```text
//! TaskNode / worker / runner ── publish(Event) ──► Bus
//!                                                   ├──► LogWriter  (tracing)
//!                                                   ├──► Metrics    (user)
//!                                                   └──► Custom ...
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
