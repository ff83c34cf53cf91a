//! Agent Supervisor: dynamic spawn/terminate/restart by type, with
//! one-for-one isolation — a failing agent never affects its siblings — and
//! a bounded restart budget so a crash-looping agent doesn't spin forever.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use vsm_core::{Agent, AgentType};
use vsm_eventbus::EventBus;
use vsm_registry::AgentRegistry;

use crate::error::SupervisorError;

const MAX_RESTARTS: usize = 5;
const RESTART_WINDOW: Duration = Duration::from_secs(60);

/// Something that knows how to start one agent process of a given type.
/// The runtime logic itself lives in `vsm-agent` / the concrete agent crate;
/// the supervisor only needs a handle back and a way to signal liveness.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn spawn(
        &self,
        agent_id: &str,
        agent_type: AgentType,
        config: serde_json::Value,
        liveness: watch::Sender<bool>,
    ) -> JoinHandle<()>;
}

struct Running {
    task: JoinHandle<()>,
    liveness: watch::Sender<bool>,
    agent_type: AgentType,
    config: serde_json::Value,
    restart_history: VecDeque<Instant>,
}

pub struct Supervisor {
    registry: Arc<AgentRegistry>,
    factory: Arc<dyn AgentFactory>,
    events: EventBus,
    running: Arc<Mutex<HashMap<String, Running>>>,
}

impl Supervisor {
    pub fn new(registry: Arc<AgentRegistry>, factory: Arc<dyn AgentFactory>, events: EventBus) -> Self {
        Self { registry, factory, events, running: Arc::new(Mutex::new(HashMap::new())) }
    }

    pub async fn spawn(
        &self,
        agent_type: AgentType,
        agent_id: Option<String>,
        config: serde_json::Value,
    ) -> Result<Agent, SupervisorError> {
        let agent_id = agent_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        {
            let running = self.running.lock().await;
            if running.contains_key(&agent_id) {
                return Err(SupervisorError::AlreadyRunning(agent_id));
            }
        }

        let (tx, rx) = watch::channel(true);
        let task = self.factory.spawn(&agent_id, agent_type, config.clone(), tx.clone()).await;

        let agent = Agent::new(&agent_id, agent_type);
        self.registry
            .register(agent.clone(), rx)
            .await
            .map_err(|_| SupervisorError::AlreadyRunning(agent_id.clone()))?;

        self.running.lock().await.insert(
            agent_id.clone(),
            Running { task, liveness: tx, agent_type, config, restart_history: VecDeque::new() },
        );

        info!(agent_id = %agent_id, "agent spawned");
        Ok(agent)
    }

    pub async fn terminate(&self, agent_id: &str) -> Result<(), SupervisorError> {
        let mut running = self.running.lock().await;
        let entry = running.remove(agent_id).ok_or_else(|| SupervisorError::NotFound(agent_id.to_string()))?;
        let _ = entry.liveness.send(false);
        entry.task.abort();
        drop(running);

        let _ = self.registry.deregister(agent_id).await;
        Ok(())
    }

    /// Restart an agent in place. One-for-one: only this agent is affected.
    /// Enforces the restart budget: max 5 restarts per rolling 60s
    /// window, then gives up and emits `agent_unrestartable`.
    pub async fn restart(&self, agent_id: &str) -> Result<Agent, SupervisorError> {
        let (agent_type, config, exceeded) = {
            let mut running = self.running.lock().await;
            let entry = running.get_mut(agent_id).ok_or_else(|| SupervisorError::NotFound(agent_id.to_string()))?;

            let now = Instant::now();
            while entry.restart_history.front().is_some_and(|t| now.duration_since(*t) > RESTART_WINDOW) {
                entry.restart_history.pop_front();
            }

            if entry.restart_history.len() >= MAX_RESTARTS {
                (entry.agent_type, entry.config.clone(), true)
            } else {
                entry.restart_history.push_back(now);
                (entry.agent_type, entry.config.clone(), false)
            }
        };

        if exceeded {
            warn!(agent_id, "restart budget exceeded, giving up");
            self.events.publish_topic("agent.unrestartable", serde_json::json!({"agent_id": agent_id}));
            return Err(SupervisorError::RestartBudgetExceeded(agent_id.to_string()));
        }

        self.terminate(agent_id).await.ok();
        self.spawn(agent_type, Some(agent_id.to_string()), config).await
    }

    pub async fn list(&self) -> Vec<Agent> {
        self.registry.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ImmediateExit;

    #[async_trait]
    impl AgentFactory for ImmediateExit {
        async fn spawn(
            &self,
            _agent_id: &str,
            _agent_type: AgentType,
            _config: serde_json::Value,
            _liveness: watch::Sender<bool>,
        ) -> JoinHandle<()> {
            tokio::spawn(async {})
        }
    }

    #[tokio::test]
    async fn spawn_registers_and_list_reflects_it() {
        let registry = Arc::new(AgentRegistry::new(EventBus::new()));
        let supervisor = Supervisor::new(registry, Arc::new(ImmediateExit), EventBus::new());

        let agent = supervisor.spawn(AgentType::Worker, Some("w1".into()), serde_json::json!({})).await.unwrap();
        assert_eq!(agent.agent_id, "w1");
        assert_eq!(supervisor.list().await.len(), 1);
    }

    #[tokio::test]
    async fn terminate_then_spawn_again_succeeds() {
        let registry = Arc::new(AgentRegistry::new(EventBus::new()));
        let supervisor = Supervisor::new(registry, Arc::new(ImmediateExit), EventBus::new());

        supervisor.spawn(AgentType::Worker, Some("w1".into()), serde_json::json!({})).await.unwrap();
        supervisor.terminate("w1").await.unwrap();
        assert_eq!(supervisor.list().await.len(), 0);

        supervisor.spawn(AgentType::Worker, Some("w1".into()), serde_json::json!({})).await.unwrap();
        assert_eq!(supervisor.list().await.len(), 1);
    }

    #[tokio::test]
    async fn restart_budget_gives_up_after_five() {
        let registry = Arc::new(AgentRegistry::new(EventBus::new()));
        let supervisor = Supervisor::new(registry, Arc::new(ImmediateExit), EventBus::new());

        supervisor.spawn(AgentType::Worker, Some("w1".into()), serde_json::json!({})).await.unwrap();
        for _ in 0..5 {
            supervisor.restart("w1").await.unwrap();
        }
        let result = supervisor.restart("w1").await;
        assert!(matches!(result, Err(SupervisorError::RestartBudgetExceeded(_))));
    }
}
