//! The correlation table: maps `correlation_id` to a waiting caller
//! and its deadline. A single reaper task removes expired entries and wakes
//! their waiters with `timeout`. Replies carrying an unknown correlation_id
//! are logged and dropped; a second reply for an already-resolved id is
//! idempotently discarded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;
use vsm_core::CommandResult;

struct PendingCall {
    tx: oneshot::Sender<CommandResult>,
    deadline: Instant,
}

#[derive(Clone)]
pub struct CorrelationTable {
    inner: Arc<Mutex<HashMap<Uuid, PendingCall>>>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Register a pending call and return the receiver the caller awaits.
    pub fn register(&self, correlation_id: Uuid, deadline_ms: u64) -> oneshot::Receiver<CommandResult> {
        let (tx, rx) = oneshot::channel();
        let deadline = Instant::now() + Duration::from_millis(deadline_ms);
        self.inner.lock().insert(correlation_id, PendingCall { tx, deadline });
        rx
    }

    /// Resolve a pending call with a Result. Unknown or already-resolved ids
    /// are silently dropped (idempotent discard).
    pub fn resolve(&self, result: CommandResult) {
        let pending = self.inner.lock().remove(&result.correlation_id);
        match pending {
            Some(pending) => {
                // Sender may have been dropped if the caller already gave up
                // on timeout; that's fine, this is still a discard.
                let _ = pending.tx.send(result);
            }
            None => {
                debug!(correlation_id = %result.correlation_id, "reply for unknown or already-resolved correlation_id, dropping");
            }
        }
    }

    /// Remove a pending call (used when a caller abandons it, e.g. the
    /// `tokio::time::timeout` guard fires before the reaper runs).
    pub fn cancel(&self, correlation_id: &Uuid) {
        self.inner.lock().remove(correlation_id);
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// One reaping sweep: remove and notify everything past its deadline.
    /// Returns the number reaped.
    pub fn reap_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Uuid> = {
            let guard = self.inner.lock();
            guard
                .iter()
                .filter(|(_, call)| call.deadline <= now)
                .map(|(id, _)| *id)
                .collect()
        };

        for id in &expired {
            let pending = self.inner.lock().remove(id);
            if let Some(pending) = pending {
                warn!(correlation_id = %id, "call timed out, reaping");
                let _ = pending.tx.send(CommandResult::timeout(*id, 0));
            }
        }
        expired.len()
    }

    /// Spawn the periodic reaper task that expires stale correlations.
    pub fn spawn_reaper(self, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.reap_expired();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsm_core::ResultStatus;

    #[tokio::test]
    async fn resolve_wakes_the_waiter() {
        let table = CorrelationTable::new();
        let id = Uuid::new_v4();
        let rx = table.register(id, 10_000);

        table.resolve(CommandResult::ok(id, serde_json::json!({"ok": true}), 5));

        let result = rx.await.unwrap();
        assert_eq!(result.status, ResultStatus::Ok);
    }

    #[tokio::test]
    async fn unknown_correlation_id_is_dropped_silently() {
        let table = CorrelationTable::new();
        // No panic, no registered waiter.
        table.resolve(CommandResult::ok(Uuid::new_v4(), serde_json::json!({}), 1));
        assert_eq!(table.pending_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_resolve_is_idempotent() {
        let table = CorrelationTable::new();
        let id = Uuid::new_v4();
        let rx = table.register(id, 10_000);

        table.resolve(CommandResult::ok(id, serde_json::json!({"n": 1}), 1));
        // Second resolve for the same (now-removed) id is a no-op, not a panic.
        table.resolve(CommandResult::ok(id, serde_json::json!({"n": 2}), 1));

        let result = rx.await.unwrap();
        assert_eq!(result.payload, Some(serde_json::json!({"n": 1})));
    }

    #[tokio::test]
    async fn reaper_times_out_expired_calls() {
        let table = CorrelationTable::new();
        let id = Uuid::new_v4();
        let rx = table.register(id, 0);

        tokio::time::sleep(Duration::from_millis(5)).await;
        let reaped = table.reap_expired();
        assert_eq!(reaped, 1);

        let result = rx.await.unwrap();
        assert_eq!(result.status, ResultStatus::Timeout);
    }
}
