//! Algedonic Processor: consumes `vsm.algedonic`, updates viability, and
//! escalates sustained pain past the critical threshold.

use std::collections::VecDeque;
use std::sync::Arc;

use lapin::options::{BasicConsumeOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use parking_lot::Mutex;
use tracing::{info, warn};
use vsm_broker::ChannelPool;
use vsm_core::{AlgedonicKind, AlgedonicSignal, Envelope};
use vsm_eventbus::EventBus;
use vsm_intelligence::Intelligence;

use crate::error::GovernanceError;
use crate::policy_store::PolicyStore;
use crate::synthesizer::PolicySynthesizer;
use crate::viability::ViabilityEvaluator;

const DEFAULT_HISTORY_CAP: usize = 1000;
const DEFAULT_PAIN_CRITICAL: f64 = 0.7;
/// Window (most recent signals) the pain-frequency term is computed over.
const RECENT_WINDOW: usize = 20;

pub struct AlgedonicProcessor {
    viability: Arc<ViabilityEvaluator>,
    intelligence: Arc<Intelligence>,
    policy_store: Arc<PolicyStore>,
    synthesizer: Arc<PolicySynthesizer>,
    events: EventBus,
    history: Mutex<VecDeque<AlgedonicSignal>>,
    pain_critical: f64,
}

impl AlgedonicProcessor {
    pub fn new(
        viability: Arc<ViabilityEvaluator>,
        intelligence: Arc<Intelligence>,
        policy_store: Arc<PolicyStore>,
        synthesizer: Arc<PolicySynthesizer>,
        events: EventBus,
    ) -> Self {
        Self {
            viability,
            intelligence,
            policy_store,
            synthesizer,
            events,
            history: Mutex::new(VecDeque::new()),
            pain_critical: DEFAULT_PAIN_CRITICAL,
        }
    }

    pub fn with_pain_critical(mut self, threshold: f64) -> Self {
        self.pain_critical = threshold.clamp(0.0, 1.0);
        self
    }

    /// Process one signal in arrival order; callers are responsible for
    /// serializing calls through a single worker (the consumer loop below
    /// does this naturally by awaiting each signal before the next).
    pub async fn process(&self, signal: AlgedonicSignal) {
        let recent_pain_frequency = {
            let mut history = self.history.lock();
            if history.len() >= DEFAULT_HISTORY_CAP {
                history.pop_front();
            }
            history.push_back(signal.clone());

            let recent: Vec<AlgedonicKind> = history.iter().rev().take(RECENT_WINDOW).map(|s| s.kind).collect();
            let pain_count = recent.iter().filter(|k| **k == AlgedonicKind::Pain).count();
            pain_count as f64 / recent.len().max(1) as f64
        };

        self.viability.update_from_signal(signal.kind, signal.intensity, recent_pain_frequency);

        if signal.kind == AlgedonicKind::Pleasure {
            let reinforced = self.policy_store.reinforce_matching(&signal.context).await;
            if !reinforced.is_empty() {
                info!(count = reinforced.len(), source = %signal.source, "pleasure signal reinforced matching policies");
            }
        }

        self.events.publish_topic(
            "algedonic.processed",
            serde_json::json!({"kind": format!("{:?}", signal.kind), "intensity": signal.intensity, "source": signal.source}),
        );

        if signal.kind == AlgedonicKind::Pain && signal.intensity > self.pain_critical {
            warn!(intensity = signal.intensity, source = %signal.source, "critical pain signal, escalating");
            let intelligence = self.intelligence.clone();
            let rationale = format!("critical pain from {} at intensity {:.2}", signal.source, signal.intensity);
            tokio::spawn(async move {
                intelligence.request_critical_proposal(rationale, "algedonic");
            });

            let synthesizer = self.synthesizer.clone();
            let summary = serde_json::json!({"source": signal.source, "intensity": signal.intensity, "context": signal.context});
            tokio::spawn(async move {
                if let Err(err) = synthesizer.synthesize(summary).await {
                    warn!(error = %err, "policy synthesis request failed");
                }
            });

            self.events.publish_topic(
                "policy.synthesis.requested",
                serde_json::json!({"source": signal.source, "intensity": signal.intensity}),
            );
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Declare this processor's own queue bound to the fanout `vsm.algedonic`
    /// exchange and consume it for the life of the process.
    pub async fn spawn_consumer(self: Arc<Self>, pool: Arc<ChannelPool>) -> Result<(), GovernanceError> {
        let lease = pool.acquire("governance-algedonic").await?;
        let queue = "vsm.governance.algedonic";
        lease
            .channel()
            .queue_declare(queue, QueueDeclareOptions { durable: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(vsm_broker::BrokerError::Lapin)?;
        lease
            .channel()
            .queue_bind(queue, "vsm.algedonic", "", QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(vsm_broker::BrokerError::Lapin)?;

        let mut consumer = lease
            .channel()
            .basic_consume(queue, "governance-algedonic-consumer", BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(vsm_broker::BrokerError::Lapin)?;

        let processor = self;
        tokio::spawn(async move {
            use futures::StreamExt;
            use lapin::options::BasicAckOptions;
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else { continue };
                match Envelope::<AlgedonicSignal>::from_json_bytes(&delivery.data) {
                    Ok(envelope) => processor.process(envelope.body).await,
                    Err(err) => warn!(error = %err, "malformed algedonic envelope, dropping"),
                }
                let _ = delivery.ack(BasicAckOptions::default()).await;
            }
        });

        info!("algedonic consumer started");
        std::mem::forget(lease);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_router::Router;

    fn processor() -> (AlgedonicProcessor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let router = Arc::new(Router::new(pool.clone(), "s5"));
        let intelligence = Arc::new(Intelligence::new(router, EventBus::new()));
        let policy_store = Arc::new(PolicyStore::open(dir.path().join("policy.log"), pool, EventBus::new()).unwrap());
        let synthesizer = Arc::new(PolicySynthesizer::new(intelligence.clone(), policy_store.clone(), EventBus::new()));
        let proc = AlgedonicProcessor::new(Arc::new(ViabilityEvaluator::new()), intelligence, policy_store, synthesizer, EventBus::new());
        (proc, dir)
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (proc, _dir) = processor();
        for i in 0..1500 {
            proc.process(AlgedonicSignal::new(AlgedonicKind::Pleasure, 0.1, format!("s{i}"), serde_json::json!({}))).await;
        }
        assert_eq!(proc.history_len(), DEFAULT_HISTORY_CAP);
    }

    #[tokio::test]
    async fn critical_pain_escalates() {
        let (proc, _dir) = processor();
        proc.process(AlgedonicSignal::new(AlgedonicKind::Pain, 0.95, "s1", serde_json::json!({}))).await;
        tokio::task::yield_now().await;
        assert_eq!(proc.history_len(), 1);
    }
}
