//! Level-5 Governance: bundles the Policy Store, Viability Evaluator,
//! Algedonic Processor, and Policy Synthesizer behind one handle.

use std::sync::Arc;

use vsm_broker::ChannelPool;
use vsm_eventbus::EventBus;
use vsm_intelligence::Intelligence;

use crate::algedonic::AlgedonicProcessor;
use crate::error::GovernanceError;
use crate::policy_store::PolicyStore;
use crate::synthesizer::PolicySynthesizer;
use crate::viability::ViabilityEvaluator;

pub struct Governance {
    pub policy_store: Arc<PolicyStore>,
    pub viability: Arc<ViabilityEvaluator>,
    pub algedonic: Arc<AlgedonicProcessor>,
    pub synthesizer: Arc<PolicySynthesizer>,
}

impl Governance {
    pub fn new(policy_log_path: impl Into<std::path::PathBuf>, pool: Arc<ChannelPool>, intelligence: Arc<Intelligence>, events: EventBus) -> Result<Self, GovernanceError> {
        let policy_store = Arc::new(PolicyStore::open(policy_log_path, pool, events.clone())?);
        let viability = Arc::new(ViabilityEvaluator::new());
        let synthesizer = Arc::new(PolicySynthesizer::new(intelligence.clone(), policy_store.clone(), events.clone()));
        let algedonic = Arc::new(AlgedonicProcessor::new(
            viability.clone(),
            intelligence,
            policy_store.clone(),
            synthesizer.clone(),
            events,
        ));
        Ok(Self { policy_store, viability, algedonic, synthesizer })
    }

    pub async fn spawn_algedonic_consumer(&self, pool: Arc<ChannelPool>) -> Result<(), GovernanceError> {
        self.algedonic.clone().spawn_consumer(pool).await
    }
}
