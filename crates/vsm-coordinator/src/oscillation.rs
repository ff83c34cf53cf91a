//! Anti-oscillation detection and the `stable -> warning -> damping -> stable`
//! state machine.
//!
//! A rolling window of metric samples is reduced to a zero-crossing count of
//! its derivative. More crossings than `threshold_f` per window pushes the
//! topic into damping; the rate has to stay below threshold for two
//! consecutive windows before it's trusted to go back to stable.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DEFAULT_WINDOW: Duration = Duration::from_secs(30);
const DEFAULT_THRESHOLD: u32 = 3;
const DAMPING_SEED_MS: u64 = 200;
const DAMPING_CAP_MS: u64 = 10_000;
const DAMPING_GROWTH_FACTOR: f64 = 1.5;
const DAMPING_SHRINK_MS: u64 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinationState {
    Stable,
    Warning,
    Damping,
}

pub struct OscillationDetector {
    window: Duration,
    threshold: u32,
    samples: VecDeque<(Instant, f64)>,
    state: CoordinationState,
    delay_ms: u64,
    consecutive_good_windows: u32,
}

impl Default for OscillationDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl OscillationDetector {
    pub fn new() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            samples: VecDeque::new(),
            state: CoordinationState::Stable,
            delay_ms: 0,
            consecutive_good_windows: 0,
        }
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn state(&self) -> CoordinationState {
        self.state
    }

    pub fn current_delay_ms(&self) -> u64 {
        self.delay_ms
    }

    /// Feed a new metric sample; returns `true` if this sample pushed the
    /// detector into (or deeper into) damping.
    pub fn record_sample(&mut self, value: f64) -> bool {
        let now = Instant::now();
        self.samples.push_back((now, value));
        while self.samples.front().is_some_and(|(t, _)| now.duration_since(*t) > self.window) {
            self.samples.pop_front();
        }

        let crossings = self.zero_crossings();
        if crossings > self.threshold {
            self.consecutive_good_windows = 0;
            self.delay_ms = if self.delay_ms == 0 {
                DAMPING_SEED_MS
            } else {
                ((self.delay_ms as f64 * DAMPING_GROWTH_FACTOR) as u64).min(DAMPING_CAP_MS)
            };
            self.state = CoordinationState::Damping;
            true
        } else {
            match self.state {
                CoordinationState::Damping => {
                    self.consecutive_good_windows += 1;
                    self.delay_ms = self.delay_ms.saturating_sub(DAMPING_SHRINK_MS);
                    if self.consecutive_good_windows >= 2 && self.delay_ms == 0 {
                        self.state = CoordinationState::Stable;
                    } else {
                        self.state = CoordinationState::Warning;
                    }
                    false
                }
                CoordinationState::Warning if self.delay_ms == 0 => {
                    self.state = CoordinationState::Stable;
                    false
                }
                _ => false,
            }
        }
    }

    fn zero_crossings(&self) -> u32 {
        let derivatives: Vec<f64> = self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .map(|((_, a), (_, b))| b - a)
            .collect();

        derivatives
            .windows(2)
            .filter(|pair| pair[0].signum() != 0.0 && pair[1].signum() != 0.0 && pair[0].signum() != pair[1].signum())
            .count() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_signal_stays_stable() {
        let mut det = OscillationDetector::new();
        for _ in 0..10 {
            det.record_sample(1.0);
        }
        assert_eq!(det.state(), CoordinationState::Stable);
    }

    #[test]
    fn oscillating_signal_triggers_damping() {
        let mut det = OscillationDetector::new();
        let mut triggered = false;
        for i in 0..12 {
            let value = if i % 2 == 0 { 1.0 } else { -1.0 };
            if det.record_sample(value) {
                triggered = true;
            }
        }
        assert!(triggered);
        assert_eq!(det.state(), CoordinationState::Damping);
        assert!(det.current_delay_ms() > 0);
    }

    #[test]
    fn delay_grows_multiplicatively_while_oscillating() {
        let mut det = OscillationDetector::new();
        let pattern = [1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0];
        for v in pattern {
            det.record_sample(v);
        }
        let first_delay = det.current_delay_ms();
        for v in pattern {
            det.record_sample(v);
        }
        let second_delay = det.current_delay_ms();
        assert!(second_delay >= first_delay);
    }
}
