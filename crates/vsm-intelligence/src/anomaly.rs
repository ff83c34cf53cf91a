//! Streaming anomaly detection over the internal event bus.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vsm_eventbus::EventBus;

const DEFAULT_BUFFER_CAP: usize = 500;
/// Events whose payload carries a numeric `severity` above this are always
/// anomalous; below it, a burst of same-type events still counts.
const SEVERITY_FLOOR: f64 = 0.6;
const BURST_THRESHOLD: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub anomaly_type: String,
    pub severity: f64,
    pub context: serde_json::Value,
    pub detected_at: DateTime<Utc>,
}

pub struct AnomalyBuffer {
    capacity: usize,
    events: VecDeque<AnomalyEvent>,
    recent_types: VecDeque<String>,
}

impl Default for AnomalyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl AnomalyBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity, events: VecDeque::new(), recent_types: VecDeque::new() }
    }

    pub fn push(&mut self, event: AnomalyEvent) {
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn recent(&self, n: usize) -> Vec<AnomalyEvent> {
        self.events.iter().rev().take(n).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Classify a raw bus event as anomalous: either it crosses the severity
    /// floor on its own, or it's part of a burst of the same `event_type`
    /// within the last `BURST_THRESHOLD` observations.
    fn classify(&mut self, event_type: &str, severity: f64) -> bool {
        if self.recent_types.len() >= BURST_THRESHOLD {
            self.recent_types.pop_front();
        }
        self.recent_types.push_back(event_type.to_string());

        let burst = self.recent_types.iter().filter(|t| t.as_str() == event_type).count() >= BURST_THRESHOLD;
        severity >= SEVERITY_FLOOR || burst
    }

    /// Feed one raw bus event through classification; returns the anomaly if
    /// it qualified, recording it into the buffer as a side effect.
    pub fn observe(&mut self, event_type: &str, severity: f64, context: serde_json::Value) -> Option<AnomalyEvent> {
        if self.classify(event_type, severity) {
            let anomaly = AnomalyEvent { anomaly_type: event_type.to_string(), severity, context, detected_at: Utc::now() };
            self.push(anomaly.clone());
            Some(anomaly)
        } else {
            None
        }
    }
}

/// Drains `bus` forever, routing every event through `buffer`'s classifier.
/// Meant to be spawned once per `Intelligence` instance.
pub async fn run_detector(bus: EventBus, buffer: std::sync::Arc<parking_lot::Mutex<AnomalyBuffer>>) {
    let mut sub = bus.subscribe();
    while let Some(event) = sub.recv().await {
        let severity = event.payload.get("severity").and_then(|v| v.as_f64()).unwrap_or(0.0);
        buffer.lock().observe(&event.topic, severity, event.payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_severity_is_always_anomalous() {
        let mut buffer = AnomalyBuffer::new();
        let anomaly = buffer.observe("s1.failure", 0.9, serde_json::json!({}));
        assert!(anomaly.is_some());
    }

    #[test]
    fn low_severity_burst_is_anomalous() {
        let mut buffer = AnomalyBuffer::new();
        let mut last = None;
        for _ in 0..BURST_THRESHOLD {
            last = buffer.observe("retry.loop", 0.1, serde_json::json!({}));
        }
        assert!(last.is_some());
    }

    #[test]
    fn isolated_low_severity_is_not_anomalous() {
        let mut buffer = AnomalyBuffer::new();
        assert!(buffer.observe("heartbeat", 0.05, serde_json::json!({})).is_none());
    }

    #[test]
    fn buffer_is_bounded() {
        let mut buffer = AnomalyBuffer::with_capacity(3);
        for i in 0..10 {
            buffer.push(AnomalyEvent {
                anomaly_type: format!("a{i}"),
                severity: 0.9,
                context: serde_json::json!({}),
                detected_at: Utc::now(),
            });
        }
        assert_eq!(buffer.len(), 3);
    }
}
