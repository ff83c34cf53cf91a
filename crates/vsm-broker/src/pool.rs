//! Per-purpose logical channel pool.
//!
//! The broker client forbids concurrent operations on a single channel;
//! opening one channel per call trips "second channel.open seen" failures
//! under load. The pool linearises usage by purpose instead: `"algedonic"`,
//! `"policy"`, `"audit"`, `"agent:<id>"` each get at most one checked-out
//! channel at a time, with additional callers queued on a semaphore.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lapin::options::{BasicConsumeOptions, BasicPublishOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};
use tracing::{info, warn};

use crate::backoff::Backoff;
use crate::error::BrokerError;

struct PurposeSlot {
    semaphore: Arc<Semaphore>,
}

/// A checked-out channel bound to a purpose label. Dropping the lease always
/// returns the slot to the pool, even on panic unwind or an early `?` return.
pub struct Lease {
    purpose: String,
    channel: Channel,
    generation: u64,
    pool_generation: Arc<AtomicU64>,
    _permit: OwnedSemaphorePermit,
}

impl Lease {
    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    /// A lease outstanding across a reconnect is invalid; callers must re-acquire.
    pub fn is_valid(&self) -> bool {
        self.generation == self.pool_generation.load(Ordering::Acquire)
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

/// Outcome of a consumer's handling of one delivery.
pub enum AckDecision {
    Ack,
    /// Permanent failure: drop without requeue.
    NackDrop,
    /// Transient failure: requeue (caller is responsible for bounding attempts).
    NackRequeue,
}

pub struct ChannelPool {
    uri: String,
    connection: Arc<RwLock<Option<Connection>>>,
    purposes: Arc<Mutex<HashMap<String, PurposeSlot>>>,
    generation: Arc<AtomicU64>,
}

impl ChannelPool {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            connection: Arc::new(RwLock::new(None)),
            purposes: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Establish the initial connection and start the reconnect supervisor.
    pub async fn connect(&self) -> Result<(), BrokerError> {
        let conn = Connection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(BrokerError::Lapin)?;
        *self.connection.write().await = Some(conn);
        self.spawn_watchdog();
        Ok(())
    }

    fn spawn_watchdog(&self) {
        let uri = self.uri.clone();
        let connection = self.connection.clone();
        let generation = self.generation.clone();
        tokio::spawn(async move {
            loop {
                let lost = {
                    let guard = connection.read().await;
                    match guard.as_ref() {
                        Some(conn) => !conn.status().connected(),
                        None => true,
                    }
                };
                if lost {
                    warn!("broker connection lost, entering reconnect mode");
                    // Invalidate every outstanding lease immediately.
                    generation.fetch_add(1, Ordering::AcqRel);
                    *connection.write().await = None;

                    let mut backoff = Backoff::new();
                    loop {
                        let delay = backoff.next_delay();
                        tokio::time::sleep(delay).await;
                        match Connection::connect(&uri, ConnectionProperties::default()).await {
                            Ok(conn) => {
                                info!("broker reconnected");
                                *connection.write().await = Some(conn);
                                break;
                            }
                            Err(err) => warn!(error = %err, "reconnect attempt failed"),
                        }
                    }
                }
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        });
    }

    async fn purpose_semaphore(&self, purpose: &str) -> Arc<Semaphore> {
        let mut purposes = self.purposes.lock().await;
        purposes
            .entry(purpose.to_string())
            .or_insert_with(|| PurposeSlot { semaphore: Arc::new(Semaphore::new(1)) })
            .semaphore
            .clone()
    }

    /// Acquire a lease for `purpose`. Concurrent callers for the same purpose
    /// queue on the semaphore (FIFO among waiters).
    pub async fn acquire(&self, purpose: &str) -> Result<Lease, BrokerError> {
        let semaphore = self.purpose_semaphore(purpose).await;
        let permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| BrokerError::Unavailable(format!("purpose {purpose} pool closed")))?;

        let guard = self.connection.read().await;
        let conn = guard
            .as_ref()
            .ok_or_else(|| BrokerError::Unavailable("no broker connection".into()))?;
        let channel = conn.create_channel().await.map_err(BrokerError::Lapin)?;

        Ok(Lease {
            purpose: purpose.to_string(),
            channel,
            generation: self.generation.load(Ordering::Acquire),
            pool_generation: self.generation.clone(),
            _permit: permit,
        })
    }

    /// Explicit release for callers that want to free a channel early.
    /// `Lease`'s `Drop` impl already guarantees this happens on every exit path.
    pub fn release(&self, lease: Lease) {
        drop(lease);
    }

    pub async fn publish(
        &self,
        lease: &Lease,
        exchange: &str,
        routing_key: &str,
        body: &[u8],
        props: BasicProperties,
    ) -> Result<(), BrokerError> {
        if !lease.is_valid() {
            return Err(BrokerError::LeaseInvalidated(lease.purpose.clone()));
        }
        lease
            .channel
            .basic_publish(exchange, routing_key, BasicPublishOptions::default(), body, props)
            .await
            .map_err(BrokerError::Lapin)?
            .await
            .map_err(BrokerError::Lapin)?;
        Ok(())
    }

    /// Install a delivery callback on `queue`. The handler MUST ack or nack
    /// every delivery; this wrapper performs the actual ack/nack based on the
    /// handler's returned decision so callers can't forget.
    pub async fn consume<F, Fut>(
        &self,
        lease: &Lease,
        queue: &str,
        consumer_tag: &str,
        handler: F,
    ) -> Result<(), BrokerError>
    where
        F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = AckDecision> + Send,
    {
        use futures::StreamExt;
        use lapin::options::{BasicAckOptions, BasicNackOptions};

        if !lease.is_valid() {
            return Err(BrokerError::LeaseInvalidated(lease.purpose.clone()));
        }

        let mut consumer = lease
            .channel
            .basic_consume(queue, consumer_tag, BasicConsumeOptions::default(), FieldTable::default())
            .await
            .map_err(BrokerError::Lapin)?;

        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else { continue };
                let decision = handler(delivery.data.clone()).await;
                let outcome = match decision {
                    AckDecision::Ack => delivery.ack(BasicAckOptions::default()).await,
                    AckDecision::NackDrop => {
                        delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await
                    }
                    AckDecision::NackRequeue => {
                        delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await
                    }
                };
                if let Err(err) = outcome {
                    warn!(error = %err, "failed to ack/nack delivery");
                }
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn purpose_slots_are_created_lazily() {
        let pool = ChannelPool::new("amqp://localhost");
        let sem1 = pool.purpose_semaphore("algedonic").await;
        let sem2 = pool.purpose_semaphore("algedonic").await;
        assert_eq!(sem1.available_permits(), sem2.available_permits());
        assert_eq!(sem1.available_permits(), 1);
    }

    #[tokio::test]
    async fn distinct_purposes_get_distinct_slots() {
        let pool = ChannelPool::new("amqp://localhost");
        let sem_a = pool.purpose_semaphore("audit").await;
        let sem_b = pool.purpose_semaphore("policy").await;
        assert_ne!(Arc::as_ptr(&sem_a), Arc::as_ptr(&sem_b));
    }
}
