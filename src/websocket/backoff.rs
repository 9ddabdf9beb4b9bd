//! Exponential reconnect backoff with jitter.

use crate::config::StreamConfig;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    factor: f64,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            min,
            max,
            factor,
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(
            config.reconnect_min,
            config.reconnect_max,
            config.reconnect_factor,
            config.reconnect_jitter,
        )
    }

    /// Un-jittered delay for the given attempt: `min * factor^attempt`,
    /// capped at `max`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let min_secs = self.min.as_secs_f64();
        let max_secs = self.max.as_secs_f64();
        let exp = self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        let scaled = min_secs * exp;
        if !scaled.is_finite() || scaled >= max_secs {
            self.max
        } else {
            Duration::from_secs_f64(scaled)
        }
    }

    /// Delay to wait before the next attempt. Advances the attempt counter.
    /// Never exceeds the configured maximum.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        self.apply_jitter(base)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Restarts the sequence from `min`. `Transport` builds a fresh backoff per
    /// reconnect cycle instead.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    fn apply_jitter(&self, base: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return base.min(self.max);
        }
        let base_secs = base.as_secs_f64();
        let spread = base_secs * self.jitter;
        let offset: f64 = rand::thread_rng().gen_range(-spread..=spread);
        let jittered = (base_secs + offset).max(0.0);
        Duration::from_secs_f64(jittered).min(self.max)
    }
}
