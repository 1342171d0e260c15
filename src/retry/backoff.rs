//! Exponential backoff calculation for failed dispatches

use std::time::Duration;

use rand::Rng;

/// Exponential backoff configuration
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay after the first failure, in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 32_000,
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Delay to observe after a failure of a record that had already failed
    /// `retry_count` times: `min(initial * multiplier^retry_count, max)`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        // Anything past this exponent is capped anyway
        let exponent = retry_count.min(64) as i32;
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.max_delay_ms as f64);

        // NaN factors fail the comparison and skip jitter
        let jitter_range = capped_delay * self.jitter_factor.clamp(0.0, 1.0);
        let final_delay = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            (capped_delay + jitter).max(1.0) as u64
        } else {
            capped_delay.max(0.0) as u64
        };

        Duration::from_millis(final_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_schedule() {
        let config = BackoffConfig::default();
        let delays: Vec<u128> = (0..=6).map(|n| config.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 32000, 32000]);
    }

    #[test]
    fn test_caps_at_max_for_huge_counts() {
        let config = BackoffConfig::default();
        assert_eq!(config.delay_for(u32::MAX), Duration::from_millis(32_000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = BackoffConfig {
            jitter_factor: 0.1,
            ..Default::default()
        };

        for _ in 0..100 {
            let delay = config.delay_for(1).as_millis();
            assert!((1800..=2200).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_zero_delay_with_jitter_does_not_panic() {
        let config = BackoffConfig {
            initial_delay_ms: 0,
            jitter_factor: 0.1,
            ..Default::default()
        };
        assert_eq!(config.delay_for(0), Duration::ZERO);

        let config = BackoffConfig {
            max_delay_ms: 0,
            jitter_factor: 0.5,
            ..Default::default()
        };
        assert_eq!(config.delay_for(3), Duration::ZERO);
    }

    #[test]
    fn test_degenerate_factors_stay_bounded() {
        let config = BackoffConfig {
            multiplier: f64::NAN,
            jitter_factor: f64::NAN,
            ..Default::default()
        };
        assert!(config.delay_for(2) <= Duration::from_millis(32_000));

        let config = BackoffConfig {
            multiplier: -2.0,
            jitter_factor: f64::INFINITY,
            ..Default::default()
        };
        assert!(config.delay_for(1) <= Duration::from_millis(64_000));
    }
}
