//! # Attempt budget.
//!
//! [`RetryPolicy`] decides how many tries a task gets and whether a successful try
//! counts against that budget.
//!
//! ```text
//! attempts = 3, always failing (transient):
//!   try 1 ─► fail ─► remaining 2 ─► retry queue
//!   try 2 ─► fail ─► remaining 1 ─► retry queue
//!   try 3 ─► fail ─► remaining 0 ─► terminal Failed
//! ```

/// Attempt budget shared by every task unless a task overrides it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of tries per task (`0` is clamped to 1).
    pub attempts: u32,
    /// Whether a successful try also decrements the remaining budget.
    ///
    /// Success is terminal for a node, so this only shows up in the reported
    /// `attempts_remaining`.
    pub success_consumes_attempt: bool,
}

impl Default for RetryPolicy {
    /// Three tries, success consumes an attempt.
    fn default() -> Self {
        Self {
            attempts: 3,
            success_consumes_attempt: true,
        }
    }
}

impl RetryPolicy {
    /// Returns the budget clamped to at least one try.
    #[inline]
    pub fn attempts_clamped(&self) -> u32 {
        self.attempts.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy {
            attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.attempts_clamped(), 1);
    }
}
