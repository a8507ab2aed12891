//! Exponential backoff policy for expiry job redelivery.
//!
//! Scheduled expiry checks can fail transiently (the store's disk write
//! fails, say). The scheduler redelivers such jobs with exponentially
//! increasing delays, up to a bounded attempt count; a job that exhausts its
//! attempts is dropped and surfaced as an operational alert, because an
//! unreclaimed reservation is a data-integrity problem, not a crash.
//!
//! Defaults: 5 attempts with 1s, 2s, 4s, 8s delays between them.

use std::time::Duration;

/// Configuration for exponential backoff redelivery.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,

    /// Delay before the first redelivery.
    pub initial_delay: Duration,

    /// Cap on the delay between redeliveries.
    pub max_delay: Duration,

    /// Multiplier for exponential growth (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Default redelivery policy.
    ///
    /// - 5 attempts with 1s, 2s, 4s, 8s delays between them
    /// - Total added wait: ~15 seconds
    pub const DEFAULT: Self = Self {
        max_attempts: 5,
        initial_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
        backoff_multiplier: 2.0,
    };

    /// Creates a new retry configuration.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Computes the delay before redelivering after the given attempt
    /// (0-indexed: attempt 0 is the first delivery).
    ///
    /// The delay grows exponentially —
    /// `initial_delay * backoff_multiplier^attempt` — capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = self.backoff_multiplier.powi(attempt as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns true when `attempt` deliveries have been made and no more are
    /// allowed.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Iterator over the redelivery delays.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|attempt| self.delay_for_attempt(attempt))
    }

    /// Total added wait across all redeliveries.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ─── Unit tests ───

    #[test]
    fn default_config_values() {
        let config = RetryConfig::DEFAULT;
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn default_delays_are_1_2_4_8() {
        let delays: Vec<_> = RetryConfig::DEFAULT.delays().collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
            ]
        );
    }

    #[test]
    fn total_max_wait_default() {
        assert_eq!(RetryConfig::DEFAULT.total_max_wait(), Duration::from_secs(15));
    }

    #[test]
    fn exhaustion_counts_the_first_delivery() {
        let config = RetryConfig::DEFAULT;
        assert!(!config.is_exhausted(0));
        assert!(!config.is_exhausted(4));
        assert!(config.is_exhausted(5));
        assert!(config.is_exhausted(6));
    }

    // ─── Properties ───

    proptest! {
        #[test]
        fn delay_never_exceeds_cap(
            initial_ms in 1u64..1000,
            max_ms in 1000u64..60000,
            multiplier in 1.5f64..3.0,
            attempt in 0u32..10,
        ) {
            let config = RetryConfig::new(
                10,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );

            prop_assert!(config.delay_for_attempt(attempt) <= Duration::from_millis(max_ms));
        }

        #[test]
        fn delay_sequence_is_monotonic(
            initial_ms in 1u64..1000,
            max_ms in 1000u64..60000,
            multiplier in 1.5f64..3.0,
            max_attempts in 2u32..15,
        ) {
            let config = RetryConfig::new(
                max_attempts,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );

            let delays: Vec<_> = config.delays().collect();
            for window in delays.windows(2) {
                prop_assert!(window[1] >= window[0]);
            }
        }

        #[test]
        fn first_delay_equals_initial_delay(
            initial_ms in 1u64..10000,
            max_ms in 10000u64..100000,
            multiplier in 1.0f64..3.0,
        ) {
            let config = RetryConfig::new(
                5,
                Duration::from_millis(initial_ms),
                Duration::from_millis(max_ms),
                multiplier,
            );

            prop_assert_eq!(config.delay_for_attempt(0), Duration::from_millis(initial_ms));
        }
    }
}
