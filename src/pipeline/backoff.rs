use std::time::Duration;

use rand::Rng as _;

use crate::runtime::config::BackoffConfig;

/// Bounded exponential backoff with jitter.
///
/// Delays grow by `multiplier` per attempt, clamp at `max`, and every
/// returned value is jittered uniformly within `±jitter_ratio`. The
/// sequence never signals exhaustion; callers retry until cancelled.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    jitter_ratio: f64,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self::from_config(&BackoffConfig {
            initial,
            max,
            ..BackoffConfig::default()
        })
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            initial: config.initial,
            max: config.max,
            multiplier: config.multiplier,
            jitter_ratio: config.jitter_ratio,
            attempts: 0,
        }
    }

    /// Returns the next delay, advancing the sequence.
    pub fn next(&mut self) -> Duration {
        let exp = self.initial.as_secs_f64() * self.multiplier.powi(self.attempts as i32);
        let capped = exp.min(self.max.as_secs_f64());
        self.attempts = self.attempts.saturating_add(1);

        let jitter = rand::thread_rng()
            .gen_range(1.0 - self.jitter_ratio..=1.0 + self.jitter_ratio);
        Duration::from_secs_f64(capped * jitter)
    }

    /// Restores the sequence to its initial delay.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}
