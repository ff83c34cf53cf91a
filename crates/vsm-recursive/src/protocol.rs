//! `SpawnMetaVSM` and `RouteRecursive`: bounded recursive addressing over
//! the `vsm.recursive` exchange.

use std::sync::Arc;

use chrono::Utc;
use lapin::BasicProperties;
use tracing::{info, warn};
use vsm_broker::{ChannelPool, TopologyDeclarator};
use vsm_core::{Envelope, MetaVsmInfo};
use vsm_eventbus::EventBus;

use crate::error::RecursiveError;
use crate::registry::MetaVsmRegistry;

const DEFAULT_MAX_DEPTH: u32 = 5;

pub struct RecursiveProtocol {
    pool: Arc<ChannelPool>,
    registry: Arc<MetaVsmRegistry>,
    events: EventBus,
    max_depth: u32,
}

impl RecursiveProtocol {
    pub fn new(pool: Arc<ChannelPool>, events: EventBus) -> Self {
        Self { pool, registry: Arc::new(MetaVsmRegistry::new()), events, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> Arc<MetaVsmRegistry> {
        self.registry.clone()
    }

    /// Declares `vsm.meta.<identity>` bindings and starts tracking a fresh
    /// meta-VSM parameterized by `specialization`. The parent's active
    /// policies are captured as a snapshot, not a live reference, so later
    /// parent mutations don't leak into the child.
    pub async fn spawn_meta_vsm(
        &self,
        identity: &str,
        parent_identity: Option<&str>,
        specialization: serde_json::Value,
        parent_policy_snapshot: serde_json::Value,
    ) -> Result<MetaVsmInfo, RecursiveError> {
        let depth = parent_identity.map(|p| self.registry.depth_of(p) + 1).unwrap_or(1);
        if depth > self.max_depth {
            warn!(identity, depth, max = self.max_depth, "recursion limit exceeded");
            return Err(RecursiveError::RecursionLimitExceeded { depth, max: self.max_depth });
        }

        let lease = self.pool.acquire("recursive").await?;
        TopologyDeclarator::declare_meta_topology(&lease, identity).await?;

        let info = MetaVsmInfo {
            identity: identity.to_string(),
            parent_identity: parent_identity.map(String::from),
            depth,
            spawned_at: Utc::now(),
            exchange_prefix: format!("vsm.meta.{identity}"),
        };
        self.registry.insert(info.clone(), parent_policy_snapshot);

        self.events.publish_topic("recursive.spawned", serde_json::json!({"identity": identity, "depth": depth, "specialization": specialization}));
        info!(identity, depth, "meta-vsm spawned");
        Ok(info)
    }

    /// `RouteRecursive(identity, msg)`: publish to `vsm.recursive` with
    /// routing key `meta.<identity>`.
    pub async fn route_recursive(&self, identity: &str, msg: serde_json::Value) -> Result<(), RecursiveError> {
        if self.registry.get(identity).is_none() {
            return Err(RecursiveError::UnknownIdentity(identity.to_string()));
        }

        let lease = self.pool.acquire("recursive").await?;
        let envelope = Envelope::new("recursive", msg);
        let body = envelope.to_json_bytes()?;
        self.pool.publish(&lease, "vsm.recursive", &format!("meta.{identity}"), &body, BasicProperties::default()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol() -> RecursiveProtocol {
        RecursiveProtocol::new(Arc::new(ChannelPool::new("amqp://localhost")), EventBus::new())
    }

    #[tokio::test]
    async fn route_to_unknown_identity_errors() {
        let protocol = protocol();
        let result = protocol.route_recursive("ghost", serde_json::json!({})).await;
        assert!(matches!(result, Err(RecursiveError::UnknownIdentity(_))));
    }

    #[test]
    fn depth_of_root_spawn_is_one() {
        let protocol = RecursiveProtocol::new(Arc::new(ChannelPool::new("amqp://localhost")), EventBus::new());
        assert_eq!(protocol.registry.depth_of("anything"), 0);
    }
}
