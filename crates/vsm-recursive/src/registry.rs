//! Tracks spawned meta-VSMs and the policy snapshot each inherited at spawn
//! time (a copy, never a live link back to the parent).

use std::collections::HashMap;

use parking_lot::RwLock;
use vsm_core::MetaVsmInfo;

#[derive(Default)]
pub struct MetaVsmRegistry {
    entries: RwLock<HashMap<String, (MetaVsmInfo, serde_json::Value)>>,
}

impl MetaVsmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, info: MetaVsmInfo, policy_snapshot: serde_json::Value) {
        self.entries.write().insert(info.identity.clone(), (info, policy_snapshot));
    }

    pub fn get(&self, identity: &str) -> Option<MetaVsmInfo> {
        self.entries.read().get(identity).map(|(info, _)| info.clone())
    }

    pub fn policy_snapshot(&self, identity: &str) -> Option<serde_json::Value> {
        self.entries.read().get(identity).map(|(_, snapshot)| snapshot.clone())
    }

    /// Depth of `identity` in the spawn chain, or 0 for an untracked root.
    pub fn depth_of(&self, identity: &str) -> u32 {
        self.entries.read().get(identity).map(|(info, _)| info.depth).unwrap_or(0)
    }

    pub fn count(&self) -> usize {
        self.entries.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insert_and_lookup() {
        let registry = MetaVsmRegistry::new();
        let info = MetaVsmInfo {
            identity: "child-1".into(),
            parent_identity: Some("root".into()),
            depth: 1,
            spawned_at: Utc::now(),
            exchange_prefix: "vsm.meta.child-1".into(),
        };
        registry.insert(info, serde_json::json!({"p": 1}));
        assert_eq!(registry.depth_of("child-1"), 1);
        assert_eq!(registry.policy_snapshot("child-1"), Some(serde_json::json!({"p": 1})));
    }

    #[test]
    fn unknown_identity_has_zero_depth() {
        let registry = MetaVsmRegistry::new();
        assert_eq!(registry.depth_of("ghost"), 0);
    }
}
