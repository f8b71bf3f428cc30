//! # Backoff policy for reconnects and persistence retries.
//!
//! [`BackoffPolicy`] spaces out repeated attempts at something that failed:
//! re-opening the bus subscription after a broker drop, or re-sending a session
//! record to storage. The delay for retry `n` (0-indexed) is
//! `first × factor^n`, clamped to `max`, then jittered. The base is derived from
//! the retry number only, so jitter never feeds back into later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use repvisor::{BackoffPolicy, JitterPolicy};
//!
//! let reconnect = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(reconnect.next(0), Duration::from_millis(100));
//! assert_eq!(reconnect.next(3), Duration::from_millis(800));
//! assert_eq!(reconnect.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Retry backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Constant 100ms delay, capped at 30s, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Same delay every time; handy for tests and for hardware polling.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay before retry number `retry` (0-indexed).
    ///
    /// Overflowing or non-finite intermediate values clamp to [`BackoffPolicy::max`].
    pub fn next(&self, retry: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doubling(jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter,
        }
    }

    #[test]
    fn test_reconnect_delays_double_until_cap() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(5), Duration::from_millis(3200));
        assert_eq!(policy.next(6), Duration::from_secs(5));
    }

    #[test]
    fn test_constant_policy() {
        let policy = BackoffPolicy::constant(Duration::from_millis(50));
        for retry in 0..10 {
            assert_eq!(policy.next(retry), Duration::from_millis(50));
        }
    }

    #[test]
    fn test_first_exceeding_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_huge_retry_number_clamps_to_max() {
        let policy = doubling(JitterPolicy::None);
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_equal_jitter_stays_in_upper_half() {
        let policy = doubling(JitterPolicy::Equal);
        for retry in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(retry as i32)).min(5_000.0);
            let delay = policy.next(retry);
            assert!(delay >= Duration::from_millis((base_ms / 2.0) as u64));
            assert!(delay <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_full_jitter_never_exceeds_base() {
        let policy = doubling(JitterPolicy::Full);
        for retry in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(retry as i32)).min(5_000.0);
            assert!(policy.next(retry) <= Duration::from_millis(base_ms as u64));
        }
    }
}
