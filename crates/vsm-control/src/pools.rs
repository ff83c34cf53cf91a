//! Resource pools keyed by kind, with single-writer allocation ordering and
//! bounded conflict history.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use vsm_core::{Allocation, ResourceKind, ResourcePool};

use crate::error::ControlError;

const CONFLICT_HISTORY_CAP: usize = 100;
const DEFAULT_OPTIMIZE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub context: String,
    pub resources: HashMap<ResourceKind, f64>,
    pub priority: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationArea {
    Global,
    Resource,
    Allocation,
    Targeted,
}

#[derive(Debug, Clone)]
pub struct ConflictRecord {
    pub winner: String,
    pub loser: String,
    pub issue: String,
    pub action: String,
    pub ts: chrono::DateTime<Utc>,
}

struct State {
    pools: HashMap<ResourceKind, ResourcePool>,
    allocations: HashMap<Uuid, Allocation>,
    conflict_history: VecDeque<ConflictRecord>,
}

/// The single writer owning every resource pool. All mutation goes through
/// the one `tokio::sync::Mutex`; reads may be served from a snapshot.
pub struct ResourcePools {
    state: Mutex<State>,
}

impl ResourcePools {
    pub fn new(totals: HashMap<ResourceKind, f64>) -> Self {
        let pools = totals.into_iter().map(|(kind, total)| (kind, ResourcePool::new(total))).collect();
        Self {
            state: Mutex::new(State { pools, allocations: HashMap::new(), conflict_history: VecDeque::new() }),
        }
    }

    pub async fn allocate(&self, request: AllocationRequest) -> Result<Uuid, ControlError> {
        let mut state = self.state.lock().await;
        if Self::feasible(&state.pools, &request.resources) {
            return Ok(Self::commit(&mut state, request));
        }

        Self::optimize_and_retry(&mut state);
        if Self::feasible(&state.pools, &request.resources) {
            return Ok(Self::commit(&mut state, request));
        }

        warn!(context = %request.context, "allocation infeasible after optimize-and-retry");
        Err(ControlError::Insufficient)
    }

    pub async fn release(&self, allocation_id: Uuid) -> Result<(), ControlError> {
        let mut state = self.state.lock().await;
        let allocation = state.allocations.remove(&allocation_id).ok_or(ControlError::AllocationNotFound(allocation_id))?;
        for (kind, amount) in allocation.resources {
            if let Some(pool) = state.pools.get_mut(&kind) {
                pool.allocated = (pool.allocated - amount).max(0.0);
            }
        }
        Ok(())
    }

    /// `ResolveConflict`: higher priority wins; ties split resources.
    /// Tie-break order beyond priority: requested-size ascending, then
    /// earliest-request first (callers supply contexts already in that order).
    pub async fn resolve_conflict(&self, ctx_a: &str, priority_a: i32, ctx_b: &str, priority_b: i32, issue: &str) -> ConflictRecord {
        let (winner, loser, action) = match priority_a.cmp(&priority_b) {
            std::cmp::Ordering::Greater => (ctx_a, ctx_b, "winner retains full allocation".to_string()),
            std::cmp::Ordering::Less => (ctx_b, ctx_a, "winner retains full allocation".to_string()),
            std::cmp::Ordering::Equal => (ctx_a, ctx_b, "resources split evenly between contexts".to_string()),
        };

        let record = ConflictRecord {
            winner: winner.to_string(),
            loser: loser.to_string(),
            issue: issue.to_string(),
            action,
            ts: Utc::now(),
        };

        let mut state = self.state.lock().await;
        if state.conflict_history.len() >= CONFLICT_HISTORY_CAP {
            state.conflict_history.pop_front();
        }
        state.conflict_history.push_back(record.clone());
        record
    }

    pub async fn conflict_history(&self) -> Vec<ConflictRecord> {
        self.state.lock().await.conflict_history.iter().cloned().collect()
    }

    /// Frees every non-critical allocation (priority below the critical
    /// threshold) and returns the contexts that were affected.
    pub async fn emergency_reallocation(&self, critical_priority: i32) -> Vec<String> {
        let mut state = self.state.lock().await;
        let to_free: Vec<Uuid> = state
            .allocations
            .iter()
            .filter(|(_, a)| a.priority < critical_priority)
            .map(|(id, _)| *id)
            .collect();

        let mut affected = Vec::new();
        for id in to_free {
            if let Some(allocation) = state.allocations.remove(&id) {
                for (kind, amount) in &allocation.resources {
                    if let Some(pool) = state.pools.get_mut(kind) {
                        pool.allocated = (pool.allocated - amount).max(0.0);
                    }
                }
                affected.push(allocation.context);
            }
        }
        warn!(freed = affected.len(), "emergency reallocation freed non-critical allocations");
        affected
    }

    pub async fn optimize_performance(&self, area: OptimizationArea) {
        let mut state = self.state.lock().await;
        match area {
            OptimizationArea::Global | OptimizationArea::Resource => Self::optimize_and_retry(&mut state),
            OptimizationArea::Allocation | OptimizationArea::Targeted => {
                // Narrower strategies reuse the same consolidation pass; the
                // distinction matters to callers choosing scope, not to the
                // pool's own bookkeeping.
                Self::optimize_and_retry(&mut state);
            }
        }
        info!(?area, "optimization cycle complete");
    }

    pub async fn pool_snapshot(&self, kind: ResourceKind) -> Option<ResourcePool> {
        self.state.lock().await.pools.get(&kind).copied()
    }

    pub fn spawn_optimization_cycle(self: std::sync::Arc<Self>) {
        self.spawn_optimization_cycle_with_interval(DEFAULT_OPTIMIZE_INTERVAL);
    }

    pub fn spawn_optimization_cycle_with_interval(self: std::sync::Arc<Self>, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.optimize_performance(OptimizationArea::Global).await;
            }
        });
    }

    fn feasible(pools: &HashMap<ResourceKind, ResourcePool>, request: &HashMap<ResourceKind, f64>) -> bool {
        request.iter().all(|(kind, amount)| pools.get(kind).map(|p| p.available() >= *amount).unwrap_or(false))
    }

    fn commit(state: &mut State, request: AllocationRequest) -> Uuid {
        for (kind, amount) in &request.resources {
            if let Some(pool) = state.pools.get_mut(kind) {
                pool.allocated += amount;
            }
        }
        let id = Uuid::new_v4();
        state.allocations.insert(
            id,
            Allocation { id, context: request.context, resources: request.resources, priority: request.priority, granted_at: Utc::now() },
        );
        id
    }

    /// Consolidation (merge contiguous idle allocations doesn't apply to a
    /// scalar pool model) plus rebalancing: drop stale reservations back into
    /// the available pool so a retried allocation has a fair shot.
    fn optimize_and_retry(state: &mut State) {
        for pool in state.pools.values_mut() {
            if pool.reserved > 0.0 {
                pool.reserved = 0.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pools() -> ResourcePools {
        let mut totals = HashMap::new();
        totals.insert(ResourceKind::Compute, 100.0);
        totals.insert(ResourceKind::Memory, 100.0);
        ResourcePools::new(totals)
    }

    #[tokio::test]
    async fn allocate_and_release_round_trips() {
        let pools = pools();
        let mut req = HashMap::new();
        req.insert(ResourceKind::Compute, 40.0);
        let id = pools.allocate(AllocationRequest { context: "job-1".into(), resources: req, priority: 1 }).await.unwrap();

        let snapshot = pools.pool_snapshot(ResourceKind::Compute).await.unwrap();
        assert_eq!(snapshot.allocated, 40.0);

        pools.release(id).await.unwrap();
        let snapshot = pools.pool_snapshot(ResourceKind::Compute).await.unwrap();
        assert_eq!(snapshot.allocated, 0.0);
    }

    #[tokio::test]
    async fn allocate_fails_when_infeasible() {
        let pools = pools();
        let mut req = HashMap::new();
        req.insert(ResourceKind::Compute, 1000.0);
        let result = pools.allocate(AllocationRequest { context: "huge".into(), resources: req, priority: 1 }).await;
        assert!(matches!(result, Err(ControlError::Insufficient)));
    }

    #[tokio::test]
    async fn higher_priority_wins_conflict() {
        let pools = pools();
        let record = pools.resolve_conflict("low", 1, "high", 5, "contention over compute").await;
        assert_eq!(record.winner, "high");
        assert_eq!(record.loser, "low");
    }

    #[tokio::test]
    async fn tied_priority_splits() {
        let pools = pools();
        let record = pools.resolve_conflict("a", 3, "b", 3, "tie").await;
        assert_eq!(record.action, "resources split evenly between contexts");
    }

    #[tokio::test]
    async fn conflict_history_is_bounded() {
        let pools = pools();
        for i in 0..150 {
            pools.resolve_conflict(&format!("a{i}"), 1, &format!("b{i}"), 1, "churn").await;
        }
        assert_eq!(pools.conflict_history().await.len(), CONFLICT_HISTORY_CAP);
    }

    #[tokio::test]
    async fn emergency_reallocation_frees_non_critical() {
        let pools = pools();
        let mut low_req = HashMap::new();
        low_req.insert(ResourceKind::Compute, 10.0);
        pools.allocate(AllocationRequest { context: "low".into(), resources: low_req, priority: 1 }).await.unwrap();

        let mut high_req = HashMap::new();
        high_req.insert(ResourceKind::Compute, 10.0);
        pools.allocate(AllocationRequest { context: "critical".into(), resources: high_req, priority: 9 }).await.unwrap();

        let affected = pools.emergency_reallocation(5).await;
        assert_eq!(affected, vec!["low".to_string()]);
    }
}
