//! Internal Event Bus: in-process publish/subscribe with topic
//! strings and typed payloads (here, `serde_json::Value`, since consumers
//! span the dashboard layer and several unrelated components).
//!
//! Fan-out is best-effort: a subscriber that falls behind is not allowed to
//! backpressure publishers. `tokio::sync::broadcast` gives us exactly that —
//! a lagging receiver just skips ahead and we log a warning. This bus MUST
//! NOT be used for cross-process coordination; that's the broker's job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub topic: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(topic: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { topic: topic.into(), payload, ts: Utc::now() }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to all subscribers. A bus with zero subscribers is a no-op,
    /// not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn publish_topic(&self, topic: impl Into<String>, payload: serde_json::Value) {
        self.publish(Event::new(topic, payload));
    }

    /// Subscribe to every event on the bus; filter by topic client-side with
    /// `Subscription::recv_matching`.
    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.sender.subscribe() }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub struct Subscription {
    rx: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event, regardless of topic.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event bus subscriber lagged, events dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive the next event whose topic starts with `prefix`.
    pub async fn recv_matching(&mut self, prefix: &str) -> Option<Event> {
        loop {
            let event = self.recv().await?;
            if event.topic.starts_with(prefix) {
                return Some(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish_topic("agent.registered", serde_json::json!({"id": "w1"}));

        let event = sub.recv().await.unwrap();
        assert_eq!(event.topic, "agent.registered");
    }

    #[tokio::test]
    async fn fan_out_reaches_all_subscribers() {
        let bus = EventBus::new();
        let mut sub_a = bus.subscribe();
        let mut sub_b = bus.subscribe();
        bus.publish_topic("policy.update", serde_json::json!({}));

        assert!(sub_a.recv().await.is_some());
        assert!(sub_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn topic_prefix_filtering() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe();
        bus.publish_topic("agent.registered", serde_json::json!({}));
        bus.publish_topic("coord.oscillation", serde_json::json!({"x": 1}));

        let event = sub.recv_matching("coord.").await.unwrap();
        assert_eq!(event.topic, "coord.oscillation");
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_error() {
        let bus = EventBus::new();
        bus.publish_topic("noop", serde_json::json!({}));
    }
}
