//! Level-3* Audit Channel: a bypass path that inspects agent state without
//! ever waiting on Coordinator damping tokens.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use vsm_core::{AuditRecord, AuditStatus, Command, CommandTarget};
use vsm_eventbus::EventBus;
use vsm_router::Router;

use crate::error::ControlError;

const DEFAULT_AUDIT_DEADLINE: Duration = Duration::from_secs(5);

pub struct AuditChannel {
    router: Arc<Router>,
    events: EventBus,
    deadline: Duration,
}

impl AuditChannel {
    pub fn new(router: Arc<Router>, events: EventBus) -> Self {
        Self { router, events, deadline: DEFAULT_AUDIT_DEADLINE }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// `SendAudit(target, operation)`: audit commands never modify state,
    /// only inspect; the bypass header tells both the Coordinator and the
    /// receiving agent to skip coordination tokens entirely.
    pub async fn send_audit(&self, target: &str, operation: &str, requester: &str) -> Result<AuditRecord, ControlError> {
        let audit_id = Uuid::new_v4();
        let command = Command::new(operation, CommandTarget::Agent { agent_id: target.to_string() }, serde_json::json!({}))
            .with_audit_bypass(requester);

        let started_at = Utc::now();
        let outcome = self.router.call(command.target.clone(), command, self.deadline).await;

        let record = match outcome {
            Ok(result) => {
                self.events.publish_topic("audit.complete", serde_json::json!({"audit_id": audit_id, "target": target}));
                info!(target, operation, "audit complete");
                AuditRecord {
                    audit_id,
                    target: target.to_string(),
                    operation: operation.to_string(),
                    started_at,
                    completed_at: Some(Utc::now()),
                    status: AuditStatus::Ok,
                    response_size: result.payload.map(|p| p.to_string().len()).unwrap_or(0),
                }
            }
            Err(vsm_router::RouterError::Timeout { .. }) => {
                self.events.publish_topic("audit.timeout", serde_json::json!({"audit_id": audit_id, "target": target}));
                warn!(target, operation, "audit timed out");
                AuditRecord {
                    audit_id,
                    target: target.to_string(),
                    operation: operation.to_string(),
                    started_at,
                    completed_at: None,
                    status: AuditStatus::Timeout,
                    response_size: 0,
                }
            }
            Err(err) => {
                self.events.publish_topic("audit.complete", serde_json::json!({"audit_id": audit_id, "target": target, "error": err.to_string()}));
                warn!(target, operation, error = %err, "audit failed");
                AuditRecord {
                    audit_id,
                    target: target.to_string(),
                    operation: operation.to_string(),
                    started_at,
                    completed_at: Some(Utc::now()),
                    status: AuditStatus::Error,
                    response_size: 0,
                }
            }
        };
        Ok(record)
    }

    /// `BulkAudit(targets, operation)`: fan-out with timeout aggregation.
    /// Each target is audited independently; a slow target doesn't block
    /// the others from completing within their own deadline.
    pub async fn bulk_audit(&self, targets: &[String], operation: &str, requester: &str) -> HashMap<String, AuditRecord> {
        let mut results = HashMap::with_capacity(targets.len());
        let futures = targets.iter().map(|target| self.send_audit(target, operation, requester));
        for (target, outcome) in targets.iter().zip(futures::future::join_all(futures).await) {
            if let Ok(record) = outcome {
                results.insert(target.clone(), record);
            }
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_broker::ChannelPool;

    #[tokio::test]
    async fn audit_deadline_defaults_to_five_seconds() {
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let router = Arc::new(Router::new(pool, "audit-test"));
        let channel = AuditChannel::new(router, EventBus::new());
        assert_eq!(channel.deadline, DEFAULT_AUDIT_DEADLINE);
    }
}
