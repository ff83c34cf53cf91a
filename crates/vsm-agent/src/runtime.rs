//! The per-agent consumer loop: command dispatch, redelivery
//! accounting, health reporting, and a clean shutdown sequence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicNackOptions};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use parking_lot::Mutex;
use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};
use uuid::Uuid;
use vsm_broker::{ChannelPool, TopologyDeclarator};
use vsm_core::{Command, CommandResult, Envelope, HandlerErrorKind, ResultStatus};
use vsm_router::HandlerOutcome;

use crate::capability::CapabilityTable;
use crate::error::AgentError;

const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
const MAX_REDELIVERY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub agent_id: String,
    /// Single in-flight command unless set > 1.
    pub concurrent_dispatch: usize,
    pub health_interval: Duration,
}

impl AgentConfig {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self { agent_id: agent_id.into(), concurrent_dispatch: 1, health_interval: DEFAULT_HEALTH_INTERVAL }
    }

    pub fn with_concurrent_dispatch(mut self, n: usize) -> Self {
        self.concurrent_dispatch = n.max(1);
        self
    }
}

/// A running agent: consumer loop + health reporter, torn down together.
pub struct AgentRuntime {
    config: AgentConfig,
    pool: Arc<ChannelPool>,
    consumer_handle: tokio::task::JoinHandle<()>,
    health_handle: tokio::task::JoinHandle<()>,
    liveness: watch::Sender<bool>,
}

impl AgentRuntime {
    /// Start the agent: acquire its channel lease, declare topology, and
    /// spawn the consumer loop plus the periodic health reporter.
    pub async fn start(
        pool: Arc<ChannelPool>,
        config: AgentConfig,
        capabilities: CapabilityTable,
    ) -> Result<Self, AgentError> {
        let purpose = format!("agent:{}", config.agent_id);
        let lease = pool.acquire(&purpose).await?;
        TopologyDeclarator::declare_agent_topology(&lease, &config.agent_id, &capabilities.names()).await?;

        let command_queue = format!("vsm.s1.{}.command", config.agent_id);
        let results_exchange = format!("vsm.s1.{}.results", config.agent_id);

        let mut consumer = lease
            .channel()
            .basic_consume(
                &command_queue,
                &format!("agent-{}-consumer", config.agent_id),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let dispatch_semaphore = Arc::new(Semaphore::new(config.concurrent_dispatch));
        let attempts: Arc<Mutex<HashMap<Uuid, u32>>> = Arc::new(Mutex::new(HashMap::new()));
        let agent_id = config.agent_id.clone();
        let pool_for_loop = pool.clone();
        let results_exchange_for_loop = results_exchange.clone();

        let consumer_handle = tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let Ok(delivery) = delivery else { continue };
                let permit = dispatch_semaphore.clone().acquire_owned().await;
                let Ok(permit) = permit else { break };

                let capabilities = capabilities.clone();
                let attempts = attempts.clone();
                let pool = pool_for_loop.clone();
                let agent_id = agent_id.clone();
                let results_exchange = results_exchange_for_loop.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let Ok(envelope) = Envelope::<Command>::from_json_bytes(&delivery.data) else {
                        warn!("malformed command envelope, dropping without requeue");
                        let _ = delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await;
                        return;
                    };
                    let command = envelope.body;
                    let correlation_id = command.correlation_id.unwrap_or(command.id);
                    let reply_to = command.reply_to.clone();

                    let start = std::time::Instant::now();
                    let outcome = capabilities.dispatch(command.clone()).await;
                    let duration_ms = start.elapsed().as_millis() as u64;

                    let (result, permanent_failure) = match outcome {
                        HandlerOutcome::Ok(payload) => (CommandResult::ok(correlation_id, payload, duration_ms), false),
                        HandlerOutcome::Error { kind, message } => {
                            let permanent = matches!(kind, HandlerErrorKind::InvalidInput | HandlerErrorKind::Unauthorized);
                            (CommandResult::error(correlation_id, kind, message, duration_ms), permanent)
                        }
                    };

                    if reply_to.is_some() || command.correlation_id.is_some() {
                        if let Err(err) =
                            publish_result(&pool, &agent_id, &results_exchange, reply_to.as_deref(), &result).await
                        {
                            warn!(error = %err, "failed to publish agent result");
                        }
                    }

                    let requeue_decision = if result.status == ResultStatus::Ok || permanent_failure {
                        None
                    } else {
                        let mut table = attempts.lock();
                        let count = table.entry(command.id).or_insert(0);
                        *count += 1;
                        let requeue = *count < MAX_REDELIVERY_ATTEMPTS;
                        if !requeue {
                            table.remove(&command.id);
                        }
                        Some(requeue)
                    };

                    let ack_outcome = match requeue_decision {
                        None => delivery.ack(BasicAckOptions::default()).await,
                        Some(true) => delivery.nack(BasicNackOptions { requeue: true, ..Default::default() }).await,
                        Some(false) => delivery.nack(BasicNackOptions { requeue: false, ..Default::default() }).await,
                    };
                    if let Err(err) = ack_outcome {
                        warn!(error = %err, "failed to ack/nack command delivery");
                    }
                });
            }
        });

        let (liveness_tx, _liveness_rx) = watch::channel(true);
        let health_pool = pool.clone();
        let health_agent_id = config.agent_id.clone();
        let health_interval = config.health_interval;
        let health_liveness = liveness_tx.subscribe();
        let health_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(health_interval);
            loop {
                ticker.tick().await;
                if !*health_liveness.borrow() {
                    break;
                }
                if let Err(err) = publish_health_report(&health_pool, &health_agent_id).await {
                    warn!(error = %err, "failed to publish health report");
                }
            }
        });

        info!(agent_id = %config.agent_id, "agent runtime started");
        Ok(Self { config, pool, consumer_handle, health_handle, liveness: liveness_tx })
    }

    /// Drain in-flight work, stop reporting, release the channel.
    pub async fn shutdown(self) {
        let _ = self.liveness.send(false);
        self.consumer_handle.abort();
        self.health_handle.abort();
        info!(agent_id = %self.config.agent_id, "agent runtime shut down");
        drop(self.pool);
    }
}

async fn publish_result(
    pool: &ChannelPool,
    agent_id: &str,
    results_exchange: &str,
    reply_to: Option<&str>,
    result: &CommandResult,
) -> Result<(), AgentError> {
    let lease = pool.acquire(&format!("agent:{agent_id}")).await?;
    let envelope = Envelope::new("result", result.clone());
    let body = envelope.to_json_bytes()?;
    let props = BasicProperties::default().with_delivery_mode(2);

    if let Some(reply_to) = reply_to {
        pool.publish(&lease, "", reply_to, &body, props.clone()).await?;
    }
    pool.publish(&lease, results_exchange, &format!("result.{:?}", result.status), &body, props)
        .await?;
    Ok(())
}

async fn publish_health_report(pool: &ChannelPool, agent_id: &str) -> Result<(), AgentError> {
    let lease = pool.acquire(&format!("agent:{agent_id}")).await?;
    let envelope = Envelope::new("health", serde_json::json!({"agent_id": agent_id, "status": "alive"}));
    let body = envelope.to_json_bytes()?;
    pool.publish(
        &lease,
        "vsm.control",
        &format!("agent.health.{agent_id}"),
        &body,
        BasicProperties::default(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_concurrent_dispatch_floors_at_one() {
        let config = AgentConfig::new("w1").with_concurrent_dispatch(0);
        assert_eq!(config.concurrent_dispatch, 1);
    }
}
