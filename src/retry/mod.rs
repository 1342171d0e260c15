//! Retry policies for the queue processor.
//!
//! A policy answers three questions for the processor: is a record with a
//! given retry count still eligible, how long to wait before a pass, and how
//! long to wait after a failure.
//!
//! - `ExponentialRetryPolicy`: exhausted records stay queued for manual
//!   retry; each failure throttles the rest of the pass with exponential
//!   backoff.
//! - `FlatRetryPolicy`: exhausted records are dropped; a fixed delay is
//!   observed once at the start of every pass.

mod backoff;

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

pub use backoff::BackoffConfig;

use crate::config::RetryConfig;

/// What the processor does with a record that reached the retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedAction {
    /// Leave it in the store, surfaced through the failed list
    Keep,
    /// Delete it before dispatch
    Drop,
}

/// Pluggable retry policy.
pub trait RetryPolicy: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    fn max_retries(&self) -> u32;

    /// Whether a record that has failed `retry_count` times may be dispatched.
    fn should_retry(&self, retry_count: u32) -> bool {
        retry_count < self.max_retries()
    }

    fn exhausted_action(&self) -> ExhaustedAction;

    /// Delay observed once at the start of a pass, before the store is read.
    fn pass_delay(&self) -> Duration;

    /// Delay observed after a failure, given the retry count before it.
    fn failure_delay(&self, retry_count: u32) -> Duration;
}

/// Exponential backoff between failures; exhausted records are kept.
#[derive(Debug, Clone)]
pub struct ExponentialRetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffConfig,
}

impl Default for ExponentialRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryPolicy for ExponentialRetryPolicy {
    fn name(&self) -> &'static str {
        "exponential"
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn exhausted_action(&self) -> ExhaustedAction {
        ExhaustedAction::Keep
    }

    fn pass_delay(&self) -> Duration {
        Duration::ZERO
    }

    fn failure_delay(&self, retry_count: u32) -> Duration {
        self.backoff.delay_for(retry_count)
    }
}

/// Fixed delay per pass, no delay between failures; exhausted records are dropped.
#[derive(Debug, Clone)]
pub struct FlatRetryPolicy {
    pub max_retries: u32,
    pub pass_delay: Duration,
}

impl Default for FlatRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pass_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy for FlatRetryPolicy {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn exhausted_action(&self) -> ExhaustedAction {
        ExhaustedAction::Drop
    }

    fn pass_delay(&self) -> Duration {
        self.pass_delay
    }

    fn failure_delay(&self, _retry_count: u32) -> Duration {
        Duration::ZERO
    }
}

/// Build the policy selected in configuration.
///
/// Unknown policy names fall back to exponential.
pub fn create_retry_policy(config: &RetryConfig) -> Arc<dyn RetryPolicy> {
    match config.policy.as_str() {
        "flat" => {
            tracing::info!(
                policy = "flat",
                max_retries = config.flat_max_retries,
                pass_delay_ms = config.flat_pass_delay_ms,
                "Using flat retry policy"
            );
            Arc::new(FlatRetryPolicy {
                max_retries: config.flat_max_retries,
                pass_delay: Duration::from_millis(config.flat_pass_delay_ms),
            })
        }
        other => {
            if other != "exponential" {
                tracing::warn!(policy = %other, "Unknown retry policy, using exponential");
            }
            Arc::new(ExponentialRetryPolicy {
                max_retries: config.max_retries,
                backoff: BackoffConfig {
                    initial_delay_ms: config.initial_backoff_ms,
                    max_delay_ms: config.max_backoff_ms,
                    multiplier: config.multiplier,
                    jitter_factor: config.jitter_factor,
                },
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_defaults() {
        let policy = ExponentialRetryPolicy::default();
        assert_eq!(policy.max_retries(), 5);
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert_eq!(policy.exhausted_action(), ExhaustedAction::Keep);
        assert_eq!(policy.pass_delay(), Duration::ZERO);
        assert_eq!(policy.failure_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.failure_delay(4), Duration::from_millis(16000));
    }

    #[test]
    fn test_flat_defaults() {
        let policy = FlatRetryPolicy::default();
        assert_eq!(policy.max_retries(), 3);
        assert!(!policy.should_retry(3));
        assert_eq!(policy.exhausted_action(), ExhaustedAction::Drop);
        assert_eq!(policy.pass_delay(), Duration::from_secs(10));
        assert_eq!(policy.failure_delay(2), Duration::ZERO);
    }

    #[test]
    fn test_factory_selects_policy() {
        let mut config = RetryConfig::default();
        assert_eq!(create_retry_policy(&config).name(), "exponential");

        config.policy = "flat".to_string();
        let policy = create_retry_policy(&config);
        assert_eq!(policy.name(), "flat");
        assert_eq!(policy.max_retries(), 3);

        config.policy = "mystery".to_string();
        assert_eq!(create_retry_policy(&config).name(), "exponential");
    }
}
