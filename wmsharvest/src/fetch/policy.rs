//! Retry policy for tile fetches.
//!
//! Rate-limit responses (HTTP 429) and transport errors are retried with
//! exponential backoff plus jitter. Every other failure is final on the first
//! attempt.

use std::time::Duration;

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default number of attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default backoff unit. The n-th retry waits `2^n` units plus jitter.
pub const DEFAULT_BACKOFF_BASE_SECS: u64 = 1;

/// Default cap on the exponential part of the delay.
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Exponential backoff with jitter.
///
/// The delay before the retry that follows attempt `n` (0-based) is
/// `min(base * 2^n, max_delay) + base * jitter`, with `jitter` in `[0, 1)`.
#[derive(Clone, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Unit of the exponential term and of the jitter.
    pub base: Duration,
    /// Cap applied to the exponential term.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base: Duration::from_secs(DEFAULT_BACKOFF_BASE_SECS),
            max_delay: Duration::from_secs(DEFAULT_MAX_DELAY_SECS),
        }
    }
}

impl BackoffPolicy {
    /// Creates a policy with default timing and the given attempt budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Set the backoff unit.
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Whether another attempt is allowed after `attempt` (0-based) failed.
    pub fn has_attempt_after(&self, attempt: u32) -> bool {
        attempt + 1 < self.max_attempts
    }

    /// Delay to wait after the 0-based `attempt` failed.
    ///
    /// `jitter` is clamped into `[0, 1)`.
    pub fn delay_for_attempt(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let exponential = self
            .base
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);

        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 0.999_999)
        } else {
            0.0
        };

        exponential + self.base.mul_f64(jitter)
    }

    /// Delay after `attempt` with fresh random jitter.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        self.delay_for_attempt(attempt, rand::random::<f64>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_exponential_without_jitter() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0, 0.0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(1, 0.0), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2, 0.0), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3, 0.0), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_adds_fraction_of_base() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.delay_for_attempt(1, 0.5),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_delay_respects_cap() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(10, 0.0), Duration::from_secs(30));
        assert_eq!(policy.delay_for_attempt(63, 0.0), Duration::from_secs(30));
        assert!(policy.delay_for_attempt(40, 0.99) < Duration::from_secs(31));
    }

    #[test]
    fn test_delays_strictly_increase_before_cap() {
        let policy = BackoffPolicy::default();
        // Worst case: maximal jitter on the earlier retry, none on the later.
        for attempt in 0..4 {
            let earlier = policy.delay_for_attempt(attempt, 0.999);
            assert!(earlier < policy.delay_for_attempt(attempt + 1, 0.0));
        }
    }

    #[test]
    fn test_invalid_jitter_is_clamped() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for_attempt(0, -3.0), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(0, f64::NAN), Duration::from_secs(1));
        assert!(policy.delay_for_attempt(0, 7.0) < Duration::from_secs(2));
    }

    #[test]
    fn test_attempt_budget() {
        let policy = BackoffPolicy::new(3);
        assert!(policy.has_attempt_after(0));
        assert!(policy.has_attempt_after(1));
        assert!(!policy.has_attempt_after(2));
    }

    #[test]
    fn test_min_one_attempt() {
        let policy = BackoffPolicy::new(0);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.has_attempt_after(0));
    }

    #[test]
    fn test_next_delay_within_bounds() {
        let policy = BackoffPolicy::default().with_base(Duration::from_millis(10));
        for _ in 0..50 {
            let delay = policy.next_delay(2);
            assert!(delay >= Duration::from_millis(40));
            assert!(delay < Duration::from_millis(50));
        }
    }
}
