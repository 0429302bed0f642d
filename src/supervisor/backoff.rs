use std::time::Duration;

const BASE_DELAY: Duration = Duration::from_secs(5);
const MAX_DELAY: Duration = Duration::from_secs(300);

/// Runtime after which a child is considered to have been healthy: its next
/// restart starts the backoff sequence over.
pub const BACKOFF_RESET_THRESHOLD: Duration = Duration::from_secs(600);

/// Exponential restart backoff: `base * 2^attempt`, capped.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_delay: Duration,
    max_delay: Duration,
    reset_threshold: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self {
            base_delay: BASE_DELAY,
            max_delay: MAX_DELAY,
            reset_threshold: BACKOFF_RESET_THRESHOLD,
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    pub fn with_reset_threshold(mut self, reset_threshold: Duration) -> Self {
        self.reset_threshold = reset_threshold;
        self
    }

    /// Delay before restart number `attempt`. Negative attempts map to
    /// zero; attempts past 5 are capped.
    pub fn delay(&self, attempt: i32) -> Duration {
        if attempt < 0 {
            return Duration::ZERO;
        }
        if attempt >= 6 {
            return self.max_delay;
        }
        self.base_delay * 2u32.pow(attempt as u32)
    }

    /// Whether a child that ran for `elapsed` earns a fresh backoff
    /// sequence.
    pub fn resets_after(&self, elapsed: Duration) -> bool {
        elapsed >= self.reset_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_delays_follow_the_doubling_table() {
        let backoff = Backoff::new();
        let expected = [5u64, 10, 20, 40, 80, 160];
        for (attempt, secs) in expected.iter().enumerate() {
            assert_eq!(
                Duration::from_secs(*secs),
                backoff.delay(attempt as i32),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn negative_attempts_have_no_delay() {
        let backoff = Backoff::new();
        assert_eq!(Duration::ZERO, backoff.delay(-1));
        assert_eq!(Duration::ZERO, backoff.delay(i32::MIN));
    }

    #[test]
    fn delay_is_capped_from_attempt_six() {
        let backoff = Backoff::new();
        for attempt in [6, 7, 20, i32::MAX] {
            assert_eq!(backoff.delay(6), backoff.delay(attempt));
        }
        assert_eq!(Duration::from_secs(300), backoff.delay(6));
    }

    #[test]
    fn delay_is_non_decreasing() {
        let backoff = Backoff::new();
        for attempt in 0..6 {
            assert!(backoff.delay(attempt) <= backoff.delay(attempt + 1));
        }
    }

    #[test]
    fn reset_threshold_compares_elapsed_runtime() {
        let backoff = Backoff::new().with_reset_threshold(Duration::from_secs(600));
        assert!(!backoff.resets_after(Duration::from_secs(599)));
        assert!(backoff.resets_after(Duration::from_secs(600)));
        assert!(backoff.resets_after(Duration::from_secs(601)));
    }

    #[test]
    fn builder_overrides_apply() {
        let backoff = Backoff::new()
            .with_base_delay(Duration::from_millis(2))
            .with_max_delay(Duration::from_millis(50));
        assert_eq!(Duration::from_millis(2), backoff.delay(0));
        assert_eq!(Duration::from_millis(4), backoff.delay(1));
        assert_eq!(Duration::from_millis(50), backoff.delay(10));
    }
}
