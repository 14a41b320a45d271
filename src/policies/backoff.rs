//! # Backoff between retry rounds.
//!
//! The runner does not sleep per task: transiently failed tasks park in the retry queue,
//! and once the ready queue drains the caller thread sleeps **once** before moving the
//! whole batch back. [`BackoffPolicy`] computes that sleep for round `n` (0-indexed) as
//! `first × factor^n`, clamped to `max`, then jittered.
//!
//! The default is a constant 1s pause (`factor = 1.0`, no jitter).
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskgraph::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//! assert_eq!(backoff.next(2), Duration::from_millis(400));
//! assert_eq!(backoff.next(10), Duration::from_secs(1));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay policy for retry rounds.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry round.
    pub first: Duration,
    /// Cap for any round.
    pub max: Duration,
    /// Multiplicative growth per round (`1.0` = constant).
    pub factor: f64,
    /// Randomization applied after clamping.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 1s between rounds, capped at 30s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A fixed pause of `delay` for every round.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the pause before retry round `round` (0-indexed).
    ///
    /// The base is derived from the round number alone; jitter output never feeds
    /// back into later rounds.
    pub fn next(&self, round: u32) -> Duration {
        let base = self.base(round);
        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }

    fn base(&self, round: u32) -> Duration {
        let exp = round.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
