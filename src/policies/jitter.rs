//! # Jitter for retry-round delays.
//!
//! [`JitterPolicy`] randomizes the pause between retry rounds so that several runners
//! hammering the same remote service do not re-attempt in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[base, prev * 3]`, capped

use std::time::Duration;

use rand::Rng;

/// Randomization strategy applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the exact delay. Predictable; the default.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`; keeps ~75% of the delay on average.
    Equal,
    /// Random delay in `[base, prev * 3]`, capped at `max`.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter using the thread-local RNG.
    ///
    /// `Decorrelated` needs more context and is returned unchanged here;
    /// use [`apply_decorrelated`](Self::apply_decorrelated).
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with(delay, &mut rand::rng())
    }

    /// Same as [`apply`](Self::apply) with a caller-supplied RNG.
    pub fn apply_with<R: Rng + ?Sized>(&self, delay: Duration, rng: &mut R) -> Duration {
        let ms = delay.as_millis() as u64;
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full if ms == 0 => Duration::ZERO,
            JitterPolicy::Full => Duration::from_millis(rng.random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let extra = if half == 0 {
                    0
                } else {
                    rng.random_range(0..=half)
                };
                Duration::from_millis(half + extra)
            }
        }
    }

    /// Decorrelated jitter with full context; falls back to `apply(prev)` for other policies.
    pub fn apply_decorrelated(&self, base: Duration, prev: Duration, max: Duration) -> Duration {
        if !matches!(self, JitterPolicy::Decorrelated) {
            return self.apply(prev);
        }

        let base_ms = base.as_millis() as u64;
        let upper = (prev.as_millis() as u64)
            .saturating_mul(3)
            .min(max.as_millis() as u64)
            .max(base_ms);

        if base_ms >= upper {
            return base;
        }
        Duration::from_millis(rand::rng().random_range(base_ms..=upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn test_full_within_bounds_seeded() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let d = JitterPolicy::Full.apply_with(Duration::from_millis(400), &mut rng);
            assert!(d <= Duration::from_millis(400));
        }
    }

    #[test]
    fn test_equal_keeps_lower_half() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let d = JitterPolicy::Equal.apply_with(Duration::from_millis(1000), &mut rng);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_decorrelated_respects_cap() {
        let d = JitterPolicy::Decorrelated.apply_decorrelated(
            Duration::from_millis(100),
            Duration::from_secs(10),
            Duration::from_secs(2),
        );
        assert!(d >= Duration::from_millis(100));
        assert!(d <= Duration::from_secs(2));
    }
}
