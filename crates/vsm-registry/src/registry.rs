//! Agent Registry: a unique-id registry for level-1 agents with
//! liveness monitoring and event publication.
//!
//! The registry never owns an agent process — the Supervisor does. What the
//! registry holds is a relation (agent_id -> info) plus a liveness watch
//! channel the owner updates; this is the "weak reference" the data model
//! calls for.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tracing::info;
use vsm_core::Agent;
use vsm_eventbus::EventBus;

use crate::error::RegistryError;

const DEFAULT_HEALTH_SWEEP: Duration = Duration::from_secs(10);

struct Entry {
    agent: Agent,
    liveness: watch::Receiver<bool>,
}

pub struct AgentRegistry {
    agents: Arc<RwLock<HashMap<String, Entry>>>,
    events: EventBus,
}

impl AgentRegistry {
    pub fn new(events: EventBus) -> Self {
        Self { agents: Arc::new(RwLock::new(HashMap::new())), events }
    }

    /// Register an agent along with the liveness channel its owner (the
    /// Supervisor) will update. Re-registering an id already present fails
    /// with `already_registered`.
    pub async fn register(&self, agent: Agent, liveness: watch::Receiver<bool>) -> Result<(), RegistryError> {
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent.agent_id) {
            return Err(RegistryError::AlreadyRegistered(agent.agent_id.clone()));
        }
        let agent_id = agent.agent_id.clone();
        agents.insert(agent_id.clone(), Entry { agent, liveness });
        drop(agents);

        info!(agent_id = %agent_id, "agent registered");
        self.events.publish_topic("agent.registered", serde_json::json!({"agent_id": agent_id}));
        Ok(())
    }

    pub async fn deregister(&self, agent_id: &str) -> Result<(), RegistryError> {
        let mut agents = self.agents.write().await;
        agents.remove(agent_id).ok_or_else(|| RegistryError::NotFound(agent_id.to_string()))?;
        drop(agents);

        self.events.publish_topic("agent.deregistered", serde_json::json!({"agent_id": agent_id}));
        Ok(())
    }

    pub async fn lookup(&self, agent_id: &str) -> Option<Agent> {
        self.agents.read().await.get(agent_id).map(|e| e.agent.clone())
    }

    pub async fn list(&self) -> Vec<Agent> {
        self.agents.read().await.values().map(|e| e.agent.clone()).collect()
    }

    pub async fn count(&self) -> usize {
        self.agents.read().await.len()
    }

    pub fn subscribe_events(&self) -> vsm_eventbus::Subscription {
        self.events.subscribe()
    }

    /// One reconciliation sweep: any agent whose liveness channel
    /// reads `false` is considered dead, auto-deregistered, and reported.
    pub async fn sweep_liveness(&self) -> Vec<String> {
        let dead_ids: Vec<String> = {
            let agents = self.agents.read().await;
            agents
                .iter()
                .filter(|(_, e)| !*e.liveness.borrow())
                .map(|(id, _)| id.clone())
                .collect()
        };

        for id in &dead_ids {
            let mut agents = self.agents.write().await;
            if agents.remove(id).is_some() {
                drop(agents);
                self.events.publish_topic(
                    "agent.crashed",
                    serde_json::json!({"agent_id": id, "reason": "liveness channel reported dead"}),
                );
            }
        }
        dead_ids
    }

    /// Start the periodic health-check sweep as a background task.
    pub fn spawn_health_sweep(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.sweep_liveness().await;
            }
        })
    }

    pub fn spawn_default_health_sweep(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.spawn_health_sweep(DEFAULT_HEALTH_SWEEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_core::AgentType;

    fn agent(id: &str) -> Agent {
        Agent::new(id, AgentType::Worker)
    }

    #[tokio::test]
    async fn register_then_lookup() {
        let registry = AgentRegistry::new(EventBus::new());
        let (_tx, rx) = watch::channel(true);
        registry.register(agent("w1"), rx).await.unwrap();
        assert!(registry.lookup("w1").await.is_some());
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let registry = AgentRegistry::new(EventBus::new());
        let (_tx1, rx1) = watch::channel(true);
        let (_tx2, rx2) = watch::channel(true);
        registry.register(agent("w1"), rx1).await.unwrap();
        let err = registry.register(agent("w1"), rx2).await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
    }

    #[tokio::test]
    async fn register_then_deregister_is_identity() {
        let registry = AgentRegistry::new(EventBus::new());
        let (_tx, rx) = watch::channel(true);
        registry.register(agent("w1"), rx).await.unwrap();
        registry.deregister("w1").await.unwrap();
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn liveness_sweep_reaps_dead_agents() {
        let registry = AgentRegistry::new(EventBus::new());
        let (tx, rx) = watch::channel(true);
        registry.register(agent("w1"), rx).await.unwrap();

        tx.send(false).unwrap();
        let dead = registry.sweep_liveness().await;
        assert_eq!(dead, vec!["w1".to_string()]);
        assert_eq!(registry.count().await, 0);
    }
}
