//! Retry delay policy for failing feeds.

use std::time::Duration;

/// Exponential backoff with a ceiling.
///
/// Delays: base, 2*base, 4*base, ... capped at `max`. Zero attempts means no delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Delay before a feed with `attempts` consecutive failures may be retried
    pub fn delay(&self, attempts: u32) -> Duration {
        if attempts == 0 {
            return Duration::ZERO;
        }

        let factor = 2u32.checked_pow(attempts - 1).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .map(|d| d.min(self.max))
            .unwrap_or(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), Duration::from_secs(4 * 3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay() {
        let policy = BackoffPolicy::new(Duration::from_secs(60), Duration::from_secs(600));
        assert_eq!(policy.delay(0), Duration::ZERO);
        assert_eq!(policy.delay(1), Duration::from_secs(60));
        assert_eq!(policy.delay(2), Duration::from_secs(120));
        assert_eq!(policy.delay(3), Duration::from_secs(240));
        assert_eq!(policy.delay(4), Duration::from_secs(480));
        assert_eq!(policy.delay(5), Duration::from_secs(600));
        assert_eq!(policy.delay(500), Duration::from_secs(600));
    }

    #[test]
    fn test_backoff_non_decreasing_and_bounded() {
        let policy = BackoffPolicy::default();
        let mut previous = Duration::ZERO;
        for attempts in 0..=u32::from(u8::MAX) {
            let delay = policy.delay(attempts);
            assert!(delay >= previous, "delay decreased at attempt {}", attempts);
            assert!(delay <= Duration::from_secs(4 * 3600));
            previous = delay;
        }
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(4 * 3600));
    }

    #[test]
    fn test_max_never_below_base() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(30));
        assert_eq!(policy.delay(9), Duration::from_secs(30));
    }
}
