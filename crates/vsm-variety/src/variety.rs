//! Ties up-filters, down-amplifiers, and the metrics/imbalance monitor
//! together per boundary.

use parking_lot::Mutex;
use vsm_eventbus::EventBus;

use crate::amplifier::DownAmplifier;
use crate::boundary::Boundary;
use crate::filter::UpFilter;
use crate::metrics::{ImbalanceMonitor, Nudge, VarietyMetrics};

pub struct VarietyEngine {
    pub up_filter: Mutex<UpFilter>,
    pub down_amplifier: Mutex<DownAmplifier>,
    pub metrics: Mutex<VarietyMetrics>,
    boundary: Boundary,
}

impl VarietyEngine {
    pub fn new(boundary: Boundary, events: EventBus) -> Self {
        Self {
            up_filter: Mutex::new(UpFilter::new(boundary, events.clone())),
            down_amplifier: Mutex::new(DownAmplifier::new(boundary, events)),
            metrics: Mutex::new(VarietyMetrics::new()),
            boundary,
        }
    }

    /// Check the current imbalance and apply a bounded nudge to the
    /// up-filter's relevance threshold and the down-amplifier's factor.
    pub fn rebalance(&self) -> Nudge {
        let nudge = ImbalanceMonitor::evaluate(&self.metrics.lock(), self.boundary);
        match nudge {
            Nudge::RaiseFilterThreshold => {
                self.up_filter.lock().bump_relevance_threshold(0.05);
                self.down_amplifier.lock().bump_factor(-1);
            }
            Nudge::LowerFilterThreshold => {
                self.up_filter.lock().bump_relevance_threshold(-0.05);
                self.down_amplifier.lock().bump_factor(1);
            }
            Nudge::None => {}
        }
        nudge
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_starts_balanced() {
        let engine = VarietyEngine::new(Boundary::S1S2, EventBus::new());
        assert_eq!(engine.rebalance(), Nudge::None);
    }
}
