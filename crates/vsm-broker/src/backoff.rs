//! Exponential backoff with jitter for broker reconnects.
//!
//! Min 1s, capped at 30s, ±20% jitter applied to each computed delay.

use std::time::Duration;

const MIN_DELAY_MS: u64 = 1_000;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

impl Backoff {
    pub fn new() -> Self {
        Self { attempt: 0 }
    }

    /// Reset after a successful reconnect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Compute the next delay and advance internal state.
    pub fn next_delay(&mut self) -> Duration {
        let base_ms = MIN_DELAY_MS.saturating_mul(1u64 << self.attempt.min(5)).min(MAX_DELAY_MS);
        self.attempt = self.attempt.saturating_add(1);

        let jitter_span = (base_ms as f64 * JITTER_FRACTION) as i64;
        let jitter = if jitter_span > 0 {
            rand::random::<i64>().rem_euclid(2 * jitter_span + 1) - jitter_span
        } else {
            0
        };
        let delayed = (base_ms as i64 + jitter).max(MIN_DELAY_MS as i64 / 2) as u64;
        Duration::from_millis(delayed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let mut b = Backoff::new();
        let mut last = Duration::ZERO;
        for _ in 0..10 {
            let d = b.next_delay();
            assert!(d.as_millis() as u64 <= (MAX_DELAY_MS as f64 * 1.2) as u64);
            last = d;
        }
        let _ = last;
    }

    #[test]
    fn reset_restarts_from_min() {
        let mut b = Backoff::new();
        for _ in 0..5 {
            b.next_delay();
        }
        b.reset();
        let d = b.next_delay();
        assert!(d.as_millis() as u64 <= (MIN_DELAY_MS as f64 * 1.2) as u64);
    }
}
