//! The data model shared across the control plane.
//!
//! Everything here is plain data: components own the behavior, these types
//! are what flows between them over the broker or the internal event bus.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of level-1 agent process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Worker,
    Sensor,
    Api,
    Reasoner,
    Chat,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Worker => "worker",
            AgentType::Sensor => "sensor",
            AgentType::Api => "api",
            AgentType::Reasoner => "reasoner",
            AgentType::Chat => "chat",
        }
    }
}

/// A capability an agent advertises; routers dispatch by capability name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub name: String,
    pub schema_hint: Option<serde_json::Value>,
}

impl Capability {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema_hint: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.schema_hint = Some(schema);
        self
    }
}

/// Registered level-1 agent as observed by the Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub agent_type: AgentType,
    pub capabilities: Vec<Capability>,
    pub registered_at: DateTime<Utc>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Agent {
    pub fn new(agent_id: impl Into<String>, agent_type: AgentType) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_type,
            capabilities: Vec::new(),
            registered_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_capabilities(mut self, caps: Vec<Capability>) -> Self {
        self.capabilities = caps;
        self
    }

    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c.name == name)
    }
}

/// Where a command is routed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandTarget {
    Agent { agent_id: String },
    Capability { name: String },
    Broadcast,
}

impl CommandTarget {
    pub fn routing_key(&self) -> String {
        match self {
            CommandTarget::Agent { agent_id } => format!("agent.{agent_id}"),
            CommandTarget::Capability { name } => format!("capability.{name}"),
            CommandTarget::Broadcast => "broadcast".to_string(),
        }
    }
}

/// A command published on the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub command_type: String,
    pub target: CommandTarget,
    pub payload: serde_json::Value,
    pub reply_to: Option<String>,
    pub correlation_id: Option<Uuid>,
    pub deadline_ms: u64,
    /// 0..10, higher delivered first where the broker supports priority queues.
    pub priority: u8,
    pub headers: HashMap<String, String>,
}

impl Command {
    pub fn new(command_type: impl Into<String>, target: CommandTarget, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_type: command_type.into(),
            target,
            payload,
            reply_to: None,
            correlation_id: None,
            deadline_ms: 30_000,
            priority: 0,
            headers: HashMap::new(),
        }
    }

    /// A command carries a pending reply slot only when it names a `reply_to`.
    /// Commands without one are Cast semantics.
    pub fn is_call(&self) -> bool {
        self.reply_to.is_some() && self.correlation_id.is_some()
    }

    pub fn priority_clamped(mut self, priority: u8) -> Self {
        self.priority = priority.min(10);
        self
    }

    pub fn with_audit_bypass(mut self, requester: impl Into<String>) -> Self {
        self.headers.insert("x-audit-bypass".to_string(), "true".to_string());
        self.headers.insert("x-requester".to_string(), requester.into());
        self
    }

    pub fn is_audit_bypass(&self) -> bool {
        self.headers.get("x-audit-bypass").map(|v| v == "true").unwrap_or(false)
    }
}

/// Status of a resolved `Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Error,
    Timeout,
}

/// Kind of handler-reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerErrorKind {
    InvalidInput,
    Unauthorized,
    Unavailable,
    Internal,
    Timeout,
}

/// The reply to a `Command`, correlated by `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub correlation_id: Uuid,
    pub status: ResultStatus,
    pub payload: Option<serde_json::Value>,
    pub error_kind: Option<HandlerErrorKind>,
    pub error_message: Option<String>,
    pub duration_ms: u64,
}

impl CommandResult {
    pub fn ok(correlation_id: Uuid, payload: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            correlation_id,
            status: ResultStatus::Ok,
            payload: Some(payload),
            error_kind: None,
            error_message: None,
            duration_ms,
        }
    }

    pub fn error(
        correlation_id: Uuid,
        kind: HandlerErrorKind,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            correlation_id,
            status: ResultStatus::Error,
            payload: None,
            error_kind: Some(kind),
            error_message: Some(message.into()),
            duration_ms,
        }
    }

    pub fn timeout(correlation_id: Uuid, duration_ms: u64) -> Self {
        Self {
            correlation_id,
            status: ResultStatus::Timeout,
            payload: None,
            error_kind: None,
            error_message: None,
            duration_ms,
        }
    }
}

/// Pain or pleasure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgedonicKind {
    Pain,
    Pleasure,
}

/// An algedonic signal; intensity is always clamped to [0,1] on receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlgedonicSignal {
    pub kind: AlgedonicKind,
    pub intensity: f64,
    pub source: String,
    pub context: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl AlgedonicSignal {
    pub fn new(kind: AlgedonicKind, intensity: f64, source: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            kind,
            intensity: intensity.clamp(0.0, 1.0),
            source: source.into(),
            context,
            ts: Utc::now(),
        }
    }
}

/// Policy variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    Governance,
    Adaptation,
    Resource,
    Identity,
    Synthesized,
}

/// A versioned policy record held by the Policy Store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: String,
    pub policy_type: PolicyType,
    pub rules: serde_json::Value,
    pub constraints: serde_json::Value,
    pub auto_executable: bool,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    /// Times a pleasure signal's context matched this policy. Purely
    /// observational; it doesn't feed back into `auto_executable` or
    /// ordering on its own.
    #[serde(default)]
    pub reinforcement_count: u64,
}

impl Policy {
    pub fn new(policy_id: impl Into<String>, policy_type: PolicyType, rules: serde_json::Value) -> Self {
        Self {
            policy_id: policy_id.into(),
            policy_type,
            rules,
            constraints: serde_json::Value::Null,
            auto_executable: false,
            created_at: Utc::now(),
            version: 1,
            reinforcement_count: 0,
        }
    }
}

/// Urgency of an adaptation proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

/// A proposal for environmental adaptation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdaptationProposal {
    pub id: Uuid,
    pub urgency: Urgency,
    pub required_resources: HashMap<String, f64>,
    pub horizon: String,
    pub rationale: String,
}

/// Resource kind tracked by the level-3 resource pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Compute,
    Memory,
    Network,
    Storage,
}

/// A single resource pool; invariant: `0 <= allocated + reserved <= total`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourcePool {
    pub total: f64,
    pub allocated: f64,
    pub reserved: f64,
}

impl ResourcePool {
    pub fn new(total: f64) -> Self {
        Self { total, allocated: 0.0, reserved: 0.0 }
    }

    pub fn available(&self) -> f64 {
        (self.total - self.allocated - self.reserved).max(0.0)
    }

    pub fn is_consistent(&self) -> bool {
        let used = self.allocated + self.reserved;
        used >= 0.0 && used <= self.total + f64::EPSILON
    }
}

/// A granted allocation against one or more resource pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub id: Uuid,
    pub context: String,
    pub resources: HashMap<ResourceKind, f64>,
    pub priority: i32,
    pub granted_at: DateTime<Utc>,
}

/// One observed message in a variety sample window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarietyEvent {
    pub ts: DateTime<Utc>,
    pub message_type: String,
}

/// Direction of variety flow relative to a level boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarietyDirection {
    Inbound,
    Outbound,
}

/// Identity of a recursively spawned meta-VSM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaVsmInfo {
    pub identity: String,
    pub parent_identity: Option<String>,
    pub depth: u32,
    pub spawned_at: DateTime<Utc>,
    pub exchange_prefix: String,
}

/// Outcome of an audit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Pending,
    Ok,
    Error,
    Timeout,
}

/// Record of a single bypass audit inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub audit_id: Uuid,
    pub target: String,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: AuditStatus,
    pub response_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algedonic_intensity_clamps() {
        let s = AlgedonicSignal::new(AlgedonicKind::Pain, 1.7, "s1", serde_json::json!({}));
        assert_eq!(s.intensity, 1.0);
        let s = AlgedonicSignal::new(AlgedonicKind::Pain, -0.3, "s1", serde_json::json!({}));
        assert_eq!(s.intensity, 0.0);
    }

    #[test]
    fn command_without_reply_to_is_cast() {
        let cmd = Command::new("echo", CommandTarget::Broadcast, serde_json::json!({}));
        assert!(!cmd.is_call());
    }

    #[test]
    fn priority_clamps_to_ten() {
        let cmd = Command::new("echo", CommandTarget::Broadcast, serde_json::json!({})).priority_clamped(200);
        assert_eq!(cmd.priority, 10);
    }

    #[test]
    fn resource_pool_consistency() {
        let mut pool = ResourcePool::new(100.0);
        pool.allocated = 60.0;
        pool.reserved = 30.0;
        assert!(pool.is_consistent());
        assert_eq!(pool.available(), 10.0);
    }

    #[test]
    fn routing_key_forms() {
        assert_eq!(CommandTarget::Agent { agent_id: "w1".into() }.routing_key(), "agent.w1");
        assert_eq!(CommandTarget::Capability { name: "echo".into() }.routing_key(), "capability.echo");
        assert_eq!(CommandTarget::Broadcast.routing_key(), "broadcast");
    }
}
