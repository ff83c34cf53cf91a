//! Up-filters: aggregate a lower level's traffic into relevance-filtered
//! summaries, preserving anomalies and threshold crossings while dropping
//! routine noise.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::debug;
use vsm_core::VarietyEvent;
use vsm_eventbus::EventBus;

use crate::boundary::Boundary;

#[derive(Debug, Clone)]
pub struct Summary {
    pub boundary: Boundary,
    pub window_count: usize,
    pub distinct_types: usize,
    pub preserved: Vec<String>,
}

pub struct UpFilter {
    boundary: Boundary,
    window: Duration,
    relevance_threshold: f64,
    events: EventBus,
    buffer: VecDeque<(Instant, VarietyEvent)>,
}

impl UpFilter {
    pub fn new(boundary: Boundary, events: EventBus) -> Self {
        Self { boundary, window: boundary.default_window(), relevance_threshold: 0.3, events, buffer: VecDeque::new() }
    }

    pub fn with_relevance_threshold(mut self, threshold: f64) -> Self {
        self.relevance_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn relevance_threshold(&self) -> f64 {
        self.relevance_threshold
    }

    /// Nudge the relevance threshold within `[0,1]`, used by the imbalance
    /// monitor to tighten or loosen what counts as worth escalating.
    pub fn bump_relevance_threshold(&mut self, delta: f64) {
        self.relevance_threshold = (self.relevance_threshold + delta).clamp(0.0, 1.0);
    }

    /// `is_anomaly_or_conflict` events are always preserved regardless of
    /// the relevance threshold; routine events are aggregated and dropped
    /// unless the window's distinct-type ratio crosses the threshold.
    pub fn observe(&mut self, event: VarietyEvent, is_anomaly_or_conflict: bool) -> Option<Summary> {
        let now = Instant::now();
        self.buffer.push_back((now, event.clone()));
        while self.buffer.front().is_some_and(|(t, _)| now.duration_since(*t) > self.window) {
            self.buffer.pop_front();
        }

        if is_anomaly_or_conflict {
            let summary = Summary {
                boundary: self.boundary,
                window_count: self.buffer.len(),
                distinct_types: self.distinct_types(),
                preserved: vec![event.message_type],
            };
            self.publish(&summary);
            return Some(summary);
        }

        let relevance = self.distinct_types() as f64 / self.buffer.len().max(1) as f64;
        if relevance >= self.relevance_threshold {
            let summary = Summary { boundary: self.boundary, window_count: self.buffer.len(), distinct_types: self.distinct_types(), preserved: vec![] };
            self.publish(&summary);
            Some(summary)
        } else {
            debug!(relevance, "routine event dropped below relevance threshold");
            None
        }
    }

    fn distinct_types(&self) -> usize {
        let mut types: Vec<&str> = self.buffer.iter().map(|(_, e)| e.message_type.as_str()).collect();
        types.sort_unstable();
        types.dedup();
        types.len()
    }

    fn publish(&self, summary: &Summary) {
        self.events.publish_topic(
            format!("variety.summary.{:?}", summary.boundary),
            serde_json::json!({
                "window_count": summary.window_count,
                "distinct_types": summary.distinct_types,
                "preserved": summary.preserved,
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn event(t: &str) -> VarietyEvent {
        VarietyEvent { ts: Utc::now(), message_type: t.to_string() }
    }

    #[test]
    fn anomaly_is_always_preserved() {
        let mut filter = UpFilter::new(Boundary::S1S2, EventBus::new()).with_relevance_threshold(0.99);
        let summary = filter.observe(event("anomaly.spike"), true);
        assert!(summary.is_some());
        assert_eq!(summary.unwrap().preserved, vec!["anomaly.spike".to_string()]);
    }

    #[test]
    fn routine_noise_below_threshold_is_dropped() {
        let mut filter = UpFilter::new(Boundary::S1S2, EventBus::new()).with_relevance_threshold(0.9);
        for _ in 0..10 {
            filter.observe(event("heartbeat"), false);
        }
        assert!(filter.observe(event("heartbeat"), false).is_none());
    }
}
