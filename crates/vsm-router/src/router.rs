//! Command Router / RPC Layer: `Call`, `Cast`, and `RegisterHandler`
//! over the broker, with correlation-id reply tracking.

use std::sync::Arc;
use std::time::Duration;

use lapin::options::QueueDeclareOptions;
use lapin::types::FieldTable;
use lapin::BasicProperties;
use tracing::warn;
use uuid::Uuid;
use vsm_broker::{AckDecision, ChannelPool};
use vsm_core::{Command, CommandResult, CommandTarget, Envelope};

use crate::correlation::CorrelationTable;
use crate::error::RouterError;
use crate::handlers::{CommandHandler, HandlerOutcome, HandlerTable};

const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(250);

pub struct Router {
    pool: Arc<ChannelPool>,
    correlations: CorrelationTable,
    handlers: HandlerTable,
    router_id: String,
}

impl Router {
    /// Construct a router and start its correlation reaper task.
    pub fn new(pool: Arc<ChannelPool>, router_id: impl Into<String>) -> Self {
        let correlations = CorrelationTable::new();
        correlations.clone().spawn_reaper(DEFAULT_REAP_INTERVAL);
        Self { pool, correlations, handlers: HandlerTable::new(), router_id: router_id.into() }
    }

    pub fn register_handler(&self, command_type: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Result<(), RouterError> {
        self.handlers.register(command_type, handler)
    }

    fn reply_queue_name(&self) -> String {
        format!("vsm.router.{}.replies", self.router_id)
    }

    /// Declare and start consuming this router's private reply queue. Must be
    /// called once before the first `call`.
    pub async fn start_reply_consumer(&self) -> Result<(), RouterError> {
        let lease = self.pool.acquire("router-reply").await.map_err(|e| RouterError::Transport(e.to_string()))?;
        let queue = self.reply_queue_name();
        lease
            .channel()
            .queue_declare(&queue, QueueDeclareOptions { durable: false, auto_delete: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| RouterError::Transport(e.to_string()))?;

        let correlations = self.correlations.clone();
        self.pool
            .consume(&lease, &queue, "router-reply-consumer", move |body| {
                let correlations = correlations.clone();
                async move {
                    match Envelope::<CommandResult>::from_json_bytes(&body) {
                        Ok(envelope) => {
                            correlations.resolve(envelope.body);
                            AckDecision::Ack
                        }
                        Err(err) => {
                            warn!(error = %err, "malformed reply envelope, dropping");
                            AckDecision::NackDrop
                        }
                    }
                }
            })
            .await
            .map_err(|e| RouterError::Transport(e.to_string()))?;

        // Leak the lease deliberately: it lives for the process lifetime as
        // the dedicated reply-consumer channel. A fresh lease per call would
        // defeat the purpose of per-purpose pooling.
        std::mem::forget(lease);
        Ok(())
    }

    /// `Call(target, command, timeout)`: request/response with correlation.
    pub async fn call(&self, target: CommandTarget, mut command: Command, timeout: Duration) -> Result<CommandResult, RouterError> {
        let correlation_id = Uuid::new_v4();
        command.correlation_id = Some(correlation_id);
        command.reply_to = Some(self.reply_queue_name());
        command.deadline_ms = timeout.as_millis() as u64;
        command.target = target.clone();

        let rx = self.correlations.register(correlation_id, command.deadline_ms);

        if let Err(err) = self.publish_command(&target, &command).await {
            self.correlations.cancel(&correlation_id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => {
                // Sender dropped without a result; treat as transport failure.
                Err(RouterError::Transport("reply channel closed".into()))
            }
            Err(_) => {
                self.correlations.cancel(&correlation_id);
                Err(RouterError::Timeout { deadline_ms: command.deadline_ms })
            }
        }
    }

    /// `Cast(target, command)`: fire-and-forget, no correlation slot created.
    pub async fn cast(&self, target: CommandTarget, mut command: Command) -> Result<(), RouterError> {
        command.reply_to = None;
        command.correlation_id = None;
        command.target = target.clone();
        self.publish_command(&target, &command).await
    }

    async fn publish_command(&self, target: &CommandTarget, command: &Command) -> Result<(), RouterError> {
        let lease = self.pool.acquire("router-publish").await.map_err(|e| RouterError::Transport(e.to_string()))?;
        let envelope = Envelope::new("command", command.clone());
        let body = envelope.to_json_bytes().map_err(|e| RouterError::Transport(e.to_string()))?;

        let mut props = BasicProperties::default().with_delivery_mode(2);
        if let Some(reply_to) = &command.reply_to {
            props = props.with_reply_to(reply_to.clone().into());
        }

        self.pool
            .publish(&lease, "vsm.s1.commands", &target.routing_key(), &body, props)
            .await
            .map_err(|e| RouterError::Transport(e.to_string()))?;
        Ok(())
    }

    /// Dispatch a locally-consumed command to its registered handler,
    /// producing the `Result` this process should publish back.
    pub async fn dispatch_local(&self, command: Command) -> CommandResult {
        let correlation_id = command.correlation_id.unwrap_or(command.id);
        let start = std::time::Instant::now();

        let Some(handler) = self.handlers.get(&command.command_type) else {
            return CommandResult::error(
                correlation_id,
                vsm_core::HandlerErrorKind::Internal,
                format!("no handler registered for {}", command.command_type),
                start.elapsed().as_millis() as u64,
            );
        };

        match handler.handle(command).await {
            HandlerOutcome::Ok(payload) => CommandResult::ok(correlation_id, payload, start.elapsed().as_millis() as u64),
            HandlerOutcome::Error { kind, message } => {
                CommandResult::error(correlation_id, kind, message, start.elapsed().as_millis() as u64)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_queue_name_is_stable_per_router() {
        let pool = Arc::new(ChannelPool::new("amqp://localhost"));
        let router = Router::new(pool, "s3");
        assert_eq!(router.reply_queue_name(), "vsm.router.s3.replies");
    }
}
