// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded exponential backoff for automatic reconnection.

use std::time::Duration;

use courier_config::ReconnectConfig;
use courier_core::ReconnectState;

/// What to do after a connection is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Start attempt `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// All `attempts` were used.
    Exhausted { attempts: u32 },
    /// Automatic reconnection is turned off.
    Disabled,
}

/// Computes `min(initial * multiplier^(n-1), max)` for attempt `n` and caps
/// the number of attempts.
#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    enabled: bool,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    state: ReconnectState,
}

impl ReconnectionPolicy {
    pub fn new(config: &ReconnectConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.backoff_multiplier,
            state: ReconnectState::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    /// Backoff before attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let cap = self.max_delay.as_millis() as f64;
        if !millis.is_finite() || millis >= cap {
            self.max_delay
        } else {
            Duration::from_millis(millis.round() as u64)
        }
    }

    /// Consume one attempt.
    pub fn next_retry(&mut self) -> RetryDecision {
        if !self.enabled {
            return RetryDecision::Disabled;
        }
        if self.state.attempt_count >= self.max_attempts {
            return RetryDecision::Exhausted {
                attempts: self.state.attempt_count,
            };
        }

        self.state.attempt_count += 1;
        let delay = self.delay_for(self.state.attempt_count);
        self.state.next_delay_ms = delay.as_millis() as u64;
        RetryDecision::Retry {
            attempt: self.state.attempt_count,
            delay,
        }
    }

    /// Forget previous attempts.
    pub fn reset(&mut self) {
        self.state = ReconnectState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn policy(max_attempts: u32, initial: u64, max: u64, multiplier: f64) -> ReconnectionPolicy {
        ReconnectionPolicy::new(&ReconnectConfig {
            enabled: true,
            max_attempts,
            initial_delay_ms: initial,
            max_delay_ms: max,
            backoff_multiplier: multiplier,
        })
    }

    #[test]
    fn delays_grow_then_cap() {
        let p = policy(10, 1_000, 30_000, 2.0);
        let delays: Vec<u64> = (1..=7).map(|n| p.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000]);
    }

    #[test]
    fn exactly_max_attempts_then_exhausted() {
        let mut p = policy(2, 100, 10_000, 2.0);
        assert_eq!(
            p.next_retry(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(100)
            }
        );
        assert_eq!(
            p.next_retry(),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_millis(200)
            }
        );
        assert_eq!(p.next_retry(), RetryDecision::Exhausted { attempts: 2 });
        assert_eq!(p.next_retry(), RetryDecision::Exhausted { attempts: 2 });
    }

    #[test]
    fn reset_starts_over() {
        let mut p = policy(3, 100, 10_000, 2.0);
        p.next_retry();
        p.next_retry();
        assert_eq!(p.state().attempt_count, 2);
        assert_eq!(p.state().next_delay_ms, 200);
        p.reset();
        assert_eq!(p.state(), ReconnectState::default());
        assert!(matches!(p.next_retry(), RetryDecision::Retry { attempt: 1, .. }));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let mut p = ReconnectionPolicy::new(&ReconnectConfig {
            enabled: false,
            ..ReconnectConfig::default()
        });
        assert!(!p.is_enabled());
        assert_eq!(p.next_retry(), RetryDecision::Disabled);
        assert_eq!(p.state().attempt_count, 0);
    }

    #[test]
    fn huge_exponent_saturates_at_max() {
        let p = policy(u32::MAX, 1_000, 60_000, 10.0);
        assert_eq!(p.delay_for(u32::MAX), Duration::from_millis(60_000));
    }

    proptest! {
        #[test]
        fn delay_is_min_of_formula_and_cap(
            initial in 1u64..5_000,
            extra in 0u64..100_000,
            multiplier in 1.0f64..4.0,
            attempt in 1u32..40,
        ) {
            let max = initial + extra;
            let p = policy(50, initial, max, multiplier);
            let delay = p.delay_for(attempt).as_millis() as u64;

            prop_assert!(delay >= initial.min(max));
            prop_assert!(delay <= max);

            let expected = (initial as f64 * multiplier.powi(attempt as i32 - 1)).min(max as f64);
            prop_assert!((delay as f64 - expected).abs() <= 1.0);
        }

        #[test]
        fn delays_never_decrease(
            initial in 1u64..5_000,
            multiplier in 1.0f64..4.0,
            attempt in 1u32..30,
        ) {
            let p = policy(50, initial, 120_000, multiplier);
            prop_assert!(p.delay_for(attempt + 1) >= p.delay_for(attempt));
        }
    }
}
