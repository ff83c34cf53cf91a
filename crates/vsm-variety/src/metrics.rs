//! Variety metrics: per-level, per-direction counts and Shannon entropy over
//! the active window, plus an imbalance monitor that nudges filter
//! thresholds and amplifier factors within bounds.

use std::collections::HashMap;

use vsm_core::VarietyDirection;

use crate::boundary::Boundary;

const IMBALANCE_DEVIATION_THRESHOLD: f64 = 0.3;

#[derive(Debug, Default, Clone)]
struct Counter {
    type_counts: HashMap<String, u64>,
}

impl Counter {
    fn record(&mut self, message_type: &str) {
        *self.type_counts.entry(message_type.to_string()).or_insert(0) += 1;
    }

    fn total(&self) -> u64 {
        self.type_counts.values().sum()
    }

    /// Shannon entropy in bits over the observed type distribution.
    fn entropy(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }
        -self
            .type_counts
            .values()
            .map(|&count| {
                let p = count as f64 / total;
                if p > 0.0 {
                    p * p.log2()
                } else {
                    0.0
                }
            })
            .sum::<f64>()
    }
}

#[derive(Default)]
pub struct VarietyMetrics {
    counters: HashMap<(Boundary, VarietyDirection), Counter>,
}

impl VarietyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, boundary: Boundary, direction: VarietyDirection, message_type: &str) {
        self.counters.entry((boundary, direction)).or_default().record(message_type);
    }

    pub fn count(&self, boundary: Boundary, direction: VarietyDirection) -> u64 {
        self.counters.get(&(boundary, direction)).map(Counter::total).unwrap_or(0)
    }

    pub fn entropy(&self, boundary: Boundary, direction: VarietyDirection) -> f64 {
        self.counters.get(&(boundary, direction)).map(Counter::entropy).unwrap_or(0.0)
    }

    /// Ratio of inbound to outbound traffic at `boundary`; `None` when either
    /// side has no observations yet.
    pub fn balance_ratio(&self, boundary: Boundary) -> Option<f64> {
        let inbound = self.count(boundary, VarietyDirection::Inbound) as f64;
        let outbound = self.count(boundary, VarietyDirection::Outbound) as f64;
        if inbound == 0.0 || outbound == 0.0 {
            None
        } else {
            Some(inbound / outbound)
        }
    }
}

/// Detects a balance ratio that has drifted more than 30% from parity and
/// suggests a bounded nudge direction for the boundary's filter threshold
/// and amplifier factor.
pub struct ImbalanceMonitor;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nudge {
    /// Inbound is dominating: tighten the up-filter, ease off amplification.
    RaiseFilterThreshold,
    /// Outbound is dominating: loosen the up-filter, amplify more.
    LowerFilterThreshold,
    None,
}

impl ImbalanceMonitor {
    pub fn evaluate(metrics: &VarietyMetrics, boundary: Boundary) -> Nudge {
        match metrics.balance_ratio(boundary) {
            Some(ratio) if (ratio - 1.0).abs() > IMBALANCE_DEVIATION_THRESHOLD => {
                if ratio > 1.0 {
                    Nudge::RaiseFilterThreshold
                } else {
                    Nudge::LowerFilterThreshold
                }
            }
            _ => Nudge::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entropy_is_zero_for_single_type() {
        let mut metrics = VarietyMetrics::new();
        for _ in 0..5 {
            metrics.record(Boundary::S1S2, VarietyDirection::Inbound, "heartbeat");
        }
        assert_eq!(metrics.entropy(Boundary::S1S2, VarietyDirection::Inbound), 0.0);
    }

    #[test]
    fn entropy_is_positive_for_mixed_types() {
        let mut metrics = VarietyMetrics::new();
        metrics.record(Boundary::S1S2, VarietyDirection::Inbound, "a");
        metrics.record(Boundary::S1S2, VarietyDirection::Inbound, "b");
        assert!(metrics.entropy(Boundary::S1S2, VarietyDirection::Inbound) > 0.0);
    }

    #[test]
    fn balanced_ratio_yields_no_nudge() {
        let mut metrics = VarietyMetrics::new();
        for _ in 0..10 {
            metrics.record(Boundary::S2S3, VarietyDirection::Inbound, "x");
            metrics.record(Boundary::S2S3, VarietyDirection::Outbound, "x");
        }
        assert_eq!(ImbalanceMonitor::evaluate(&metrics, Boundary::S2S3), Nudge::None);
    }

    #[test]
    fn inbound_dominance_raises_threshold() {
        let mut metrics = VarietyMetrics::new();
        for _ in 0..10 {
            metrics.record(Boundary::S2S3, VarietyDirection::Inbound, "x");
        }
        metrics.record(Boundary::S2S3, VarietyDirection::Outbound, "x");
        assert_eq!(ImbalanceMonitor::evaluate(&metrics, Boundary::S2S3), Nudge::RaiseFilterThreshold);
    }
}
