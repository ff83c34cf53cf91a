//! Default `AgentFactory` for agents the resident process spawns itself:
//! a generic `AgentRuntime` with no advertised capabilities beyond what the
//! process already answers directly. A concrete deployment with real agent
//! binaries would swap this factory out; the CLI's `agent spawn` subcommand
//! has nothing else to hand the Supervisor.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;
use vsm_agent::{AgentConfig, AgentRuntime, CapabilityTable};
use vsm_broker::ChannelPool;
use vsm_core::AgentType;
use vsm_supervisor::AgentFactory;

pub struct ProcessAgentFactory {
    pool: Arc<ChannelPool>,
}

impl ProcessAgentFactory {
    pub fn new(pool: Arc<ChannelPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgentFactory for ProcessAgentFactory {
    async fn spawn(
        &self,
        agent_id: &str,
        _agent_type: AgentType,
        _config: serde_json::Value,
        liveness: watch::Sender<bool>,
    ) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let agent_id = agent_id.to_string();

        tokio::spawn(async move {
            let runtime = match AgentRuntime::start(pool, AgentConfig::new(&agent_id), CapabilityTable::new()).await {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!(agent_id = %agent_id, error = %err, "agent runtime failed to start");
                    let _ = liveness.send(false);
                    return;
                }
            };

            let mut liveness_rx = liveness.subscribe();
            while *liveness_rx.borrow() {
                if liveness_rx.changed().await.is_err() {
                    break;
                }
            }
            runtime.shutdown().await;
        })
    }
}
