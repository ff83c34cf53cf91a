//! Level-2 Coordinator: anti-oscillation dampening between sibling S1 agents
//! and cross-agent state synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use lapin::BasicProperties;
use parking_lot::Mutex;
use tracing::{info, warn};
use vsm_broker::ChannelPool;
use vsm_core::Command;
use vsm_eventbus::EventBus;

use crate::error::CoordinatorError;
use crate::oscillation::{CoordinationState, OscillationDetector};

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Allow,
    Delay(u64),
    Block(String),
}

/// Coordinates message flow between sibling agents, damping runaway
/// request/response oscillation per coordination topic.
pub struct Coordinator {
    pool: Arc<ChannelPool>,
    events: EventBus,
    detectors: Mutex<HashMap<String, OscillationDetector>>,
}

impl Coordinator {
    pub fn new(pool: Arc<ChannelPool>, events: EventBus) -> Self {
        Self { pool, events, detectors: Mutex::new(HashMap::new()) }
    }

    /// Audit-bypass commands are always allowed through regardless of
    /// coordination state; nothing may delay an audit inspection.
    pub fn coordinate_message(&self, from: &str, to: &str, msg: &Command) -> Decision {
        if msg.is_audit_bypass() {
            return Decision::Allow;
        }

        let topic = format!("{from}->{to}");
        let detectors = self.detectors.lock();
        match detectors.get(&topic) {
            Some(detector) => match detector.state() {
                CoordinationState::Damping => Decision::Delay(detector.current_delay_ms()),
                CoordinationState::Warning | CoordinationState::Stable => Decision::Allow,
            },
            None => Decision::Allow,
        }
    }

    /// Feed a fresh metric sample for `topic` (typically a request rate or
    /// queue depth observed between two agents) into the oscillation detector.
    pub fn observe_metric(&self, topic: &str, value: f64) -> CoordinationState {
        let mut detectors = self.detectors.lock();
        let detector = detectors.entry(topic.to_string()).or_default();
        let entered_damping = detector.record_sample(value);
        let state = detector.state();
        if entered_damping {
            warn!(topic, delay_ms = detector.current_delay_ms(), "oscillation detected, entering damping");
            self.events.publish_topic(
                format!("coord.oscillation.{topic}"),
                serde_json::json!({"topic": topic, "delay_ms": detector.current_delay_ms()}),
            );
        }
        state
    }

    pub fn state_of(&self, topic: &str) -> CoordinationState {
        self.detectors.lock().get(topic).map(|d| d.state()).unwrap_or(CoordinationState::Stable)
    }

    /// Publish a synchronization payload both internally and to the
    /// intelligence exchange, so S4 sees cross-agent state without polling.
    pub async fn broadcast_sync(&self, topic: &str, payload: serde_json::Value) -> Result<(), CoordinatorError> {
        self.events.publish_topic(format!("coord.{topic}"), payload.clone());

        let lease = self.pool.acquire("coordinator").await?;
        let envelope = vsm_core::Envelope::new("coord.sync", payload);
        let body = envelope.to_json_bytes()?;
        self.pool
            .publish(&lease, "vsm.intelligence", &format!("coord.{topic}"), &body, BasicProperties::default())
            .await?;
        info!(topic, "broadcast sync published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_core::CommandTarget;

    fn command() -> Command {
        Command::new("noop", CommandTarget::Broadcast, serde_json::json!({}))
    }

    #[test]
    fn audit_bypass_always_allowed() {
        let coordinator = Coordinator::new(Arc::new(ChannelPool::new("amqp://localhost")), EventBus::new());
        let msg = command().with_audit_bypass("auditor-1");
        for i in 0..20 {
            let value = if i % 2 == 0 { 1.0 } else { -1.0 };
            coordinator.observe_metric("a->b", value);
        }
        assert_eq!(coordinator.state_of("a->b"), CoordinationState::Damping);
        assert_eq!(coordinator.coordinate_message("a", "b", &msg), Decision::Allow);
    }

    #[test]
    fn unknown_topic_defaults_to_allow() {
        let coordinator = Coordinator::new(Arc::new(ChannelPool::new("amqp://localhost")), EventBus::new());
        assert_eq!(coordinator.coordinate_message("a", "b", &command()), Decision::Allow);
    }

    #[test]
    fn damping_topic_delays_non_bypass_messages() {
        let coordinator = Coordinator::new(Arc::new(ChannelPool::new("amqp://localhost")), EventBus::new());
        for i in 0..20 {
            let value = if i % 2 == 0 { 1.0 } else { -1.0 };
            coordinator.observe_metric("a->b", value);
        }
        match coordinator.coordinate_message("a", "b", &command()) {
            Decision::Delay(ms) => assert!(ms > 0),
            other => panic!("expected delay, got {other:?}"),
        }
    }
}
