//! # Dispatch polling backoff.
//!
//! A worker at capacity is re-polled through
//! [`Worker::can_receive`](crate::Worker::can_receive) until it frees a slot.
//! Poll `n` waits `first × factor^n`, capped at `max`, with the configured
//! [`JitterPolicy`] on top. Each delay is computed from `n` alone.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use taskloom::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(10),
//!     max: Duration::from_millis(100),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(10));
//! assert_eq!(backoff.next(2), Duration::from_millis(40));
//! assert_eq!(backoff.next(8), Duration::from_millis(100));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Polling backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed poll.
    pub first: Duration,
    /// Upper bound for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to the clamped delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 10ms`, `factor = 2.0`, `max = 500ms`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(10),
            max: Duration::from_millis(500),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// A policy that always waits `delay`.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay for the given poll number (0-indexed).
    ///
    /// Non-finite or negative intermediate values fall back to [`BackoffPolicy::max`].
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs <= self.max.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling() -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(10),
            max: Duration::from_millis(500),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    #[test]
    fn delays_double_until_the_cap() {
        let policy = doubling();
        let delays: Vec<u64> = (0..8).map(|n| policy.next(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![10, 20, 40, 80, 160, 320, 500, 500]);
    }

    #[test]
    fn constant_policy_never_grows() {
        let policy = BackoffPolicy::constant(Duration::from_millis(25));
        for attempt in [0, 1, 5, 100] {
            assert_eq!(policy.next(attempt), Duration::from_millis(25));
        }
    }

    #[test]
    fn first_above_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(2),
            ..doubling()
        };
        assert_eq!(policy.next(0), Duration::from_millis(500));
    }

    #[test]
    fn overflowing_exponent_clamps_to_max() {
        assert_eq!(doubling().next(u32::MAX), Duration::from_millis(500));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_full_base() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..doubling()
        };
        for _ in 0..50 {
            let delay = policy.next(3);
            assert!(delay >= Duration::from_millis(40));
            assert!(delay <= Duration::from_millis(80));
        }
    }
}
