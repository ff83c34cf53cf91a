//! Policy Synthesizer trigger: asks the reasoner for a policy body under a
//! deadline, and never lets a slow or absent reasoner block governance.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use vsm_core::PolicyType;
use vsm_eventbus::EventBus;
use vsm_intelligence::Intelligence;

use crate::error::GovernanceError;
use crate::policy_store::PolicyStore;

const DEFAULT_SYNTHESIS_DEADLINE: Duration = Duration::from_secs(30);

pub struct PolicySynthesizer {
    intelligence: Arc<Intelligence>,
    store: Arc<PolicyStore>,
    events: EventBus,
    deadline: Duration,
}

impl PolicySynthesizer {
    pub fn new(intelligence: Arc<Intelligence>, store: Arc<PolicyStore>, events: EventBus) -> Self {
        Self { intelligence, store, events, deadline: DEFAULT_SYNTHESIS_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Delegate reasoning about `anomaly_summary` and, on a confident
    /// response within the deadline, persist the result as a synthesized
    /// policy. A timeout or low-confidence fallback is reported but never
    /// treated as a crash.
    pub async fn synthesize(&self, anomaly_summary: serde_json::Value) -> Result<Option<vsm_core::Policy>, GovernanceError> {
        let prompt = "synthesize a policy addressing the following anomaly summary";
        let outcome = tokio::time::timeout(self.deadline, self.intelligence.delegate_reasoning(prompt, anomaly_summary.clone())).await;

        let response = match outcome {
            Ok(response) => response,
            Err(_) => {
                warn!("policy synthesis timed out");
                self.events.publish_topic("policy_synthesis_failed", serde_json::json!({"reason": "timeout"}));
                return Ok(None);
            }
        };

        if response.confidence < 0.5 {
            warn!(confidence = response.confidence, "policy synthesis produced low-confidence fallback, not persisting");
            self.events.publish_topic("policy_synthesis_failed", serde_json::json!({"reason": "low_confidence"}));
            return Ok(None);
        }

        let policy_id = format!("synthesized:{}", uuid::Uuid::new_v4());
        let policy = self
            .store
            .set(&policy_id, PolicyType::Synthesized, serde_json::json!({"text": response.text, "source": anomaly_summary}))
            .await?;
        info!(policy_id = %policy.policy_id, "synthesized policy persisted");
        Ok(Some(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vsm_broker::ChannelPool;
    use vsm_router::Router;

    #[tokio::test]
    async fn low_confidence_fallback_is_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let router = Arc::new(Router::new(pool.clone(), "s5-synth"));
        let intelligence = Arc::new(Intelligence::new(router, EventBus::new()).with_reasoner_timeout(Duration::from_millis(50)));
        let store = Arc::new(PolicyStore::open(dir.path().join("policy.log"), pool, EventBus::new()).unwrap());
        let synthesizer = PolicySynthesizer::new(intelligence, store, EventBus::new()).with_deadline(Duration::from_millis(200));

        let result = synthesizer.synthesize(serde_json::json!({"type": "test"})).await.unwrap();
        assert!(result.is_none());
    }
}
