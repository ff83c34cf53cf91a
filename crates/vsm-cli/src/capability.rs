//! Feeds deliveries on the resident process' own capability queue into its
//! `Router::dispatch_local`, and publishes the result back to whatever
//! reply queue the caller attached. This is the consumption half of the RPC
//! pattern `Router::call` already implements on the request side.

use std::sync::Arc;

use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use tracing::warn;
use vsm_broker::{BrokerError, ChannelPool};
use vsm_core::{Command, CommandResult, Envelope};
use vsm_router::Router;

/// Start consuming `queue` and dispatching each delivery through `router`.
/// Runs for the life of the process; the lease is leaked deliberately, the
/// same pattern the router's own reply consumer and the algedonic consumer
/// use for a channel meant to live as long as the process does.
pub async fn spawn_capability_consumer(pool: Arc<ChannelPool>, router: Arc<Router>, queue: &str) -> Result<(), BrokerError> {
    let lease = pool.acquire("control-plane-capabilities").await?;
    let mut consumer = lease
        .channel()
        .basic_consume(queue, "control-plane-capability-consumer", BasicConsumeOptions::default(), FieldTable::default())
        .await
        .map_err(BrokerError::Lapin)?;

    let publish_pool = pool.clone();
    tokio::spawn(async move {
        use futures::StreamExt;
        while let Some(delivery) = consumer.next().await {
            let Ok(delivery) = delivery else { continue };
            let router = router.clone();
            let pool = publish_pool.clone();

            tokio::spawn(async move {
                let envelope = match Envelope::<Command>::from_json_bytes(&delivery.data) {
                    Ok(envelope) => envelope,
                    Err(err) => {
                        warn!(error = %err, "malformed command envelope on capability queue, dropping");
                        let _ = delivery.ack(BasicAckOptions::default()).await;
                        return;
                    }
                };

                let command = envelope.body;
                let reply_to = command.reply_to.clone();
                let result = router.dispatch_local(command).await;

                if let Some(reply_to) = reply_to {
                    if let Err(err) = publish_result(&pool, &reply_to, &result).await {
                        warn!(error = %err, "failed to publish capability result");
                    }
                }

                let _ = delivery.ack(BasicAckOptions::default()).await;
            });
        }
    });

    std::mem::forget(lease);
    Ok(())
}

async fn publish_result(pool: &ChannelPool, reply_to: &str, result: &CommandResult) -> Result<(), BrokerError> {
    let lease = pool.acquire("control-plane-capabilities").await?;
    let envelope = Envelope::new("command_result", result.clone());
    let body = envelope.to_json_bytes()?;
    lease
        .channel()
        .basic_publish("", reply_to, BasicPublishOptions::default(), &body, BasicProperties::default())
        .await
        .map_err(BrokerError::Lapin)?
        .await
        .map_err(BrokerError::Lapin)?;
    Ok(())
}
