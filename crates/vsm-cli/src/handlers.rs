//! `CommandHandler` implementations the resident process registers with its
//! `Router` for the well-known capability names `vsmctl`'s RPC subcommands
//! target. Without these, `router.dispatch_local` has nothing to call.

use std::sync::Arc;

use async_trait::async_trait;
use vsm_control::AuditChannel;
use vsm_core::{AgentType, Command, HandlerErrorKind, PolicyType};
use vsm_governance::Governance;
use vsm_registry::AgentRegistry;
use vsm_router::{CommandHandler, HandlerOutcome};
use vsm_supervisor::Supervisor;

pub struct SupervisorSpawnHandler {
    pub supervisor: Arc<Supervisor>,
}

#[async_trait]
impl CommandHandler for SupervisorSpawnHandler {
    async fn handle(&self, command: Command) -> HandlerOutcome {
        let agent_type = match command.payload.get("agent_type").and_then(|v| v.as_str()) {
            Some("worker") => AgentType::Worker,
            Some("sensor") => AgentType::Sensor,
            Some("api") => AgentType::Api,
            Some("reasoner") => AgentType::Reasoner,
            Some("chat") => AgentType::Chat,
            _ => return HandlerOutcome::error(HandlerErrorKind::InvalidInput, "unknown or missing agent_type"),
        };
        let agent_id = command.payload.get("agent_id").and_then(|v| v.as_str()).map(str::to_string);
        let config = command.payload.get("config").cloned().unwrap_or(serde_json::Value::Null);

        match self.supervisor.spawn(agent_type, agent_id, config).await {
            Ok(agent) => HandlerOutcome::ok(serde_json::json!({"agent_id": agent.agent_id})),
            Err(err) => HandlerOutcome::error(HandlerErrorKind::Internal, err.to_string()),
        }
    }
}

pub struct SupervisorTerminateHandler {
    pub supervisor: Arc<Supervisor>,
}

#[async_trait]
impl CommandHandler for SupervisorTerminateHandler {
    async fn handle(&self, command: Command) -> HandlerOutcome {
        let Some(agent_id) = command.payload.get("agent_id").and_then(|v| v.as_str()) else {
            return HandlerOutcome::error(HandlerErrorKind::InvalidInput, "missing agent_id");
        };
        match self.supervisor.terminate(agent_id).await {
            Ok(()) => HandlerOutcome::ok(serde_json::json!({"terminated": agent_id})),
            Err(err) => HandlerOutcome::error(HandlerErrorKind::Internal, err.to_string()),
        }
    }
}

pub struct RegistryListHandler {
    pub registry: Arc<AgentRegistry>,
}

#[async_trait]
impl CommandHandler for RegistryListHandler {
    async fn handle(&self, _command: Command) -> HandlerOutcome {
        let agents = self.registry.list().await;
        HandlerOutcome::ok(serde_json::json!({"agents": agents}))
    }
}

pub struct PolicySetHandler {
    pub governance: Arc<Governance>,
}

#[async_trait]
impl CommandHandler for PolicySetHandler {
    async fn handle(&self, command: Command) -> HandlerOutcome {
        let Some(policy_type_name) = command.payload.get("policy_type").and_then(|v| v.as_str()) else {
            return HandlerOutcome::error(HandlerErrorKind::InvalidInput, "missing policy_type");
        };
        let policy_type = match policy_type_name {
            "governance" => PolicyType::Governance,
            "adaptation" => PolicyType::Adaptation,
            "resource" => PolicyType::Resource,
            "identity" => PolicyType::Identity,
            "synthesized" => PolicyType::Synthesized,
            other => return HandlerOutcome::error(HandlerErrorKind::InvalidInput, format!("unknown policy_type {other}")),
        };
        let rules = command.payload.get("rules").cloned().unwrap_or(serde_json::Value::Null);

        match self.governance.policy_store.set(policy_type_name, policy_type, rules).await {
            Ok(policy) => HandlerOutcome::ok(serde_json::to_value(&policy).unwrap_or_default()),
            Err(err) => HandlerOutcome::error(HandlerErrorKind::Internal, err.to_string()),
        }
    }
}

pub struct PolicyListHandler {
    pub governance: Arc<Governance>,
}

#[async_trait]
impl CommandHandler for PolicyListHandler {
    async fn handle(&self, _command: Command) -> HandlerOutcome {
        let policies = self.governance.policy_store.all();
        HandlerOutcome::ok(serde_json::json!({"policies": policies}))
    }
}

pub struct ViabilityHandler {
    pub governance: Arc<Governance>,
}

#[async_trait]
impl CommandHandler for ViabilityHandler {
    async fn handle(&self, _command: Command) -> HandlerOutcome {
        HandlerOutcome::ok(serde_json::json!({"score": self.governance.viability.score()}))
    }
}

pub struct AuditCapabilityHandler {
    pub audit: Arc<AuditChannel>,
}

#[async_trait]
impl CommandHandler for AuditCapabilityHandler {
    async fn handle(&self, command: Command) -> HandlerOutcome {
        let Some(target) = command.payload.get("target").and_then(|v| v.as_str()) else {
            return HandlerOutcome::error(HandlerErrorKind::InvalidInput, "missing target");
        };
        let Some(operation) = command.payload.get("operation").and_then(|v| v.as_str()) else {
            return HandlerOutcome::error(HandlerErrorKind::InvalidInput, "missing operation");
        };
        let requester = command.headers.get("x-requester").cloned().unwrap_or_else(|| "cli-operator".to_string());

        match self.audit.send_audit(target, operation, &requester).await {
            Ok(record) => HandlerOutcome::ok(serde_json::to_value(&record).unwrap_or_default()),
            Err(err) => HandlerOutcome::error(HandlerErrorKind::Internal, err.to_string()),
        }
    }
}
