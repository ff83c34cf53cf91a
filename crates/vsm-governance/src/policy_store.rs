//! Policy Store: a versioned `policy_id -> Policy` map backed by an
//! append-only JSON log. The log is the only persisted state in the whole
//! control plane; everything else is reconstructed in memory at startup.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use lapin::BasicProperties;
use parking_lot::RwLock;
use tracing::{info, warn};
use vsm_broker::ChannelPool;
use vsm_core::{Envelope, Policy, PolicyType};
use vsm_eventbus::EventBus;

use crate::error::GovernanceError;

pub struct PolicyStore {
    log_path: PathBuf,
    policies: RwLock<HashMap<String, Policy>>,
    pool: Arc<ChannelPool>,
    events: EventBus,
}

impl PolicyStore {
    /// Replay the append-only log at `log_path` (if any) to reconstruct the
    /// current version set, then return a store ready to serve reads and
    /// accept new mutations. Must run before any subsystem consumes broker
    /// traffic.
    pub fn open(log_path: impl Into<PathBuf>, pool: Arc<ChannelPool>, events: EventBus) -> Result<Self, GovernanceError> {
        let log_path = log_path.into();
        let mut policies = HashMap::new();

        if log_path.exists() {
            let file = OpenOptions::new().read(true).open(&log_path)?;
            for line in BufReader::new(file).lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Policy>(&line) {
                    Ok(policy) => {
                        policies.insert(policy.policy_id.clone(), policy);
                    }
                    Err(err) => warn!(error = %err, "skipping malformed policy log record"),
                }
            }
            info!(count = policies.len(), "policy log replayed");
        }

        Ok(Self { log_path, policies: RwLock::new(policies), pool, events })
    }

    /// `Set(type, body)`: bumps the version of an existing record or starts
    /// one at version 1, appends to the log, and broadcasts the update.
    pub async fn set(&self, policy_id: &str, policy_type: PolicyType, rules: serde_json::Value) -> Result<Policy, GovernanceError> {
        let policy = {
            let mut policies = self.policies.write();
            let version = policies.get(policy_id).map(|p| p.version + 1).unwrap_or(1);
            let reinforcement_count = policies.get(policy_id).map(|p| p.reinforcement_count).unwrap_or(0);
            let policy = Policy {
                policy_id: policy_id.to_string(),
                policy_type,
                rules,
                constraints: serde_json::Value::Null,
                auto_executable: false,
                created_at: chrono::Utc::now(),
                version,
                reinforcement_count,
            };
            policies.insert(policy_id.to_string(), policy.clone());
            policy
        };

        self.append_log(&policy)?;
        self.broadcast_update(&policy).await?;
        Ok(policy)
    }

    /// Bump `reinforcement_count` on an existing policy without touching its
    /// rules or version-worthy content; used when a pleasure signal's
    /// context matches it.
    pub async fn reinforce(&self, policy_id: &str) -> Result<Policy, GovernanceError> {
        let policy = {
            let mut policies = self.policies.write();
            let existing = policies.get_mut(policy_id).ok_or_else(|| GovernanceError::PolicyNotFound(policy_id.to_string()))?;
            existing.reinforcement_count += 1;
            existing.clone()
        };
        self.append_log(&policy)?;
        self.broadcast_update(&policy).await?;
        Ok(policy)
    }

    /// Reinforce every stored policy whose `rules` share a key/value with
    /// `context`. Returns the policies that were reinforced.
    pub async fn reinforce_matching(&self, context: &serde_json::Value) -> Vec<Policy> {
        let matching_ids: Vec<String> = {
            let policies = self.policies.read();
            policies.values().filter(|p| Self::matches_context(&p.rules, context)).map(|p| p.policy_id.clone()).collect()
        };

        let mut reinforced = Vec::with_capacity(matching_ids.len());
        for policy_id in matching_ids {
            if let Ok(policy) = self.reinforce(&policy_id).await {
                reinforced.push(policy);
            }
        }
        reinforced
    }

    fn matches_context(rules: &serde_json::Value, context: &serde_json::Value) -> bool {
        match (rules.as_object(), context.as_object()) {
            (Some(rule_fields), Some(context_fields)) => {
                context_fields.iter().any(|(key, value)| rule_fields.get(key) == Some(value))
            }
            _ => rules == context,
        }
    }

    pub fn get(&self, policy_id: &str) -> Option<Policy> {
        self.policies.read().get(policy_id).cloned()
    }

    pub fn all(&self) -> Vec<Policy> {
        self.policies.read().values().cloned().collect()
    }

    /// `Execute(id)`: only auto-executable policies run without an operator
    /// confirming; this returns the policy so the caller can act on its rules.
    pub fn execute(&self, policy_id: &str) -> Result<Policy, GovernanceError> {
        self.get(policy_id).ok_or_else(|| GovernanceError::PolicyNotFound(policy_id.to_string()))
    }

    fn append_log(&self, policy: &Policy) -> Result<(), GovernanceError> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_path)?;
        let mut line = serde_json::to_string(policy)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    async fn broadcast_update(&self, policy: &Policy) -> Result<(), GovernanceError> {
        self.events.publish_topic(
            "policy.update",
            serde_json::json!({"policy_id": policy.policy_id, "version": policy.version}),
        );

        let lease = self.pool.acquire("governance").await?;
        let envelope = Envelope::new("policy_update", policy.clone());
        let body = envelope.to_json_bytes()?;
        self.pool.publish(&lease, "vsm.policy", "", &body, BasicProperties::default()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (PolicyStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.log");
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let store = PolicyStore::open(path, pool, EventBus::new()).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn set_starts_at_version_one() {
        let (store, _dir) = store();
        let policy = store.set("p1", PolicyType::Resource, serde_json::json!({"k": "v"})).await.unwrap();
        assert_eq!(policy.version, 1);
    }

    #[tokio::test]
    async fn set_bumps_version_on_same_id() {
        let (store, _dir) = store();
        store.set("p1", PolicyType::Resource, serde_json::json!({})).await.unwrap();
        let second = store.set("p1", PolicyType::Resource, serde_json::json!({})).await.unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn log_replay_reconstructs_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policy.log");
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        {
            let store = PolicyStore::open(&path, pool.clone(), EventBus::new()).unwrap();
            store.set("p1", PolicyType::Governance, serde_json::json!({"a": 1})).await.unwrap();
            store.set("p1", PolicyType::Governance, serde_json::json!({"a": 2})).await.unwrap();
        }

        let reopened = PolicyStore::open(&path, pool, EventBus::new()).unwrap();
        let policy = reopened.get("p1").unwrap();
        assert_eq!(policy.version, 2);
        assert_eq!(policy.rules, serde_json::json!({"a": 2}));
    }

    #[tokio::test]
    async fn reinforce_matching_bumps_only_matching_policies() {
        let (store, _dir) = store();
        store.set("p1", PolicyType::Resource, serde_json::json!({"scope": "market"})).await.unwrap();
        store.set("p2", PolicyType::Resource, serde_json::json!({"scope": "identity"})).await.unwrap();

        let reinforced = store.reinforce_matching(&serde_json::json!({"scope": "market"})).await;
        assert_eq!(reinforced.len(), 1);
        assert_eq!(reinforced[0].policy_id, "p1");
        assert_eq!(store.get("p1").unwrap().reinforcement_count, 1);
        assert_eq!(store.get("p2").unwrap().reinforcement_count, 0);
    }

    #[test]
    fn execute_unknown_policy_errors() {
        let (store, _dir) = store();
        assert!(matches!(store.execute("missing"), Err(GovernanceError::PolicyNotFound(_))));
    }
}
